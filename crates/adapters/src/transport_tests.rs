// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn command_args_follow_invocation_contract() {
    let mut spec = LaunchSpec::new("/bin/kiln-worker", SlotId(3));
    spec.args = vec!["--verbose".to_string()];
    spec.operations = vec!["copy".to_string(), "checksum".to_string()];
    assert_eq!(
        spec.command_args(),
        vec![
            "--verbose",
            "--kiln-worker",
            "--slot",
            "3",
            "--operations",
            "copy,checksum"
        ]
    );
}

#[test]
fn command_args_omit_empty_operations() {
    let spec = LaunchSpec::new("w", SlotId(0));
    assert_eq!(spec.command_args(), vec!["--kiln-worker", "--slot", "0"]);
}

#[test]
fn protocol_errors_become_broken() {
    let err: ChannelError = ProtocolError::ConnectionClosed.into();
    assert_eq!(err.to_string(), "channel broken: Connection closed");
}

#[tokio::test]
async fn duplex_channel_send_and_recv() {
    use kiln_wire::Message;

    struct Inert;

    #[async_trait]
    impl WorkerProcess for Inert {
        fn id(&self) -> Option<u32> {
            None
        }
        fn is_alive(&mut self) -> bool {
            true
        }
        async fn kill(&mut self) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    let (near, far) = tokio::io::duplex(1024);
    let (near_r, near_w) = tokio::io::split(near);
    let (far_r, far_w) = tokio::io::split(far);
    let mut a = Channel::new(Box::new(near_r), Box::new(near_w), Box::new(Inert));
    let mut b = Channel::new(Box::new(far_r), Box::new(far_w), Box::new(Inert));

    a.send(&Message::Shutdown).await.unwrap();
    assert_eq!(b.recv().await.unwrap(), Message::Shutdown);

    drop(a);
    assert!(matches!(b.recv().await, Err(ChannelError::Broken(_))));
}
