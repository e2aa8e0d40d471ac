// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use kiln_core::AssetPath;
use kiln_wire::ResultStatus;

fn request(path: &str) -> Message {
    Message::TransformRequest(TransformRequest {
        asset: AssetId::generate(),
        path: AssetPath::parse(path).unwrap(),
        source: format!("/nonexistent/{path}").into(),
        operation: "copy".into(),
        config: serde_json::Value::Null,
        output_dir: None,
    })
}

async fn spawn(launcher: &FakeLauncher, slot: u32) -> Channel {
    launcher
        .spawn(&LaunchSpec::new("fake-worker", SlotId(slot)))
        .await
        .unwrap()
}

async fn next_result(channel: &mut Channel) -> TransformResult {
    loop {
        match channel.recv().await.unwrap() {
            Message::TransformResult(result) => return result,
            _ => continue,
        }
    }
}

#[tokio::test]
async fn default_behavior_succeeds_with_path_digest() {
    let launcher = FakeLauncher::new();
    let mut channel = spawn(&launcher, 0).await;
    channel.send(&request("a.txt")).await.unwrap();

    let result = next_result(&mut channel).await;
    assert_eq!(result.status, ResultStatus::Success);
    assert_eq!(result.output_hash, Some(ContentHash::of(b"a.txt")));
    assert_eq!(launcher.requests().len(), 1);
    assert_eq!(launcher.completed(), 1);
}

#[tokio::test]
async fn scripts_play_in_order_and_last_repeats() {
    let launcher = FakeLauncher::new();
    launcher.script(
        "a.txt",
        [FakeBehavior::Fail("first".into()), FakeBehavior::Succeed],
    );
    let mut channel = spawn(&launcher, 0).await;

    for expected in [ResultStatus::Failed, ResultStatus::Success, ResultStatus::Success] {
        channel.send(&request("a.txt")).await.unwrap();
        assert_eq!(next_result(&mut channel).await.status, expected);
    }
}

#[tokio::test]
async fn progress_streams_before_result() {
    let launcher = FakeLauncher::new();
    launcher.set_default(FakeBehavior::Progress(2));
    let mut channel = spawn(&launcher, 0).await;
    channel.send(&request("a.txt")).await.unwrap();

    let mut kinds = Vec::new();
    loop {
        let msg = channel.recv().await.unwrap();
        let done = matches!(msg, Message::TransformResult(_));
        kinds.push(msg.kind());
        if done {
            break;
        }
    }
    assert_eq!(kinds.len(), 5);
    assert_eq!(kinds[0], kiln_wire::MessageKind::ProgressUpdate);
    assert_eq!(kinds[4], kiln_wire::MessageKind::TransformResult);
}

#[tokio::test]
async fn crash_breaks_channel() {
    let launcher = FakeLauncher::new();
    launcher.set_default(FakeBehavior::Crash);
    let mut channel = spawn(&launcher, 0).await;
    channel.send(&request("a.txt")).await.unwrap();

    assert!(matches!(channel.recv().await, Err(ChannelError::Broken(_))));
    assert!(!channel.is_alive());
}

#[tokio::test]
async fn external_kill_breaks_hung_worker() {
    let launcher = FakeLauncher::new();
    launcher.set_default(FakeBehavior::Hang);
    let mut channel = spawn(&launcher, 4).await;
    channel.send(&request("a.txt")).await.unwrap();

    // Wait until the worker has picked up the request
    while launcher.requests().is_empty() {
        tokio::task::yield_now().await;
    }
    assert!(launcher.kill_worker(SlotId(4)));
    assert!(matches!(channel.recv().await, Err(ChannelError::Broken(_))));
    assert!(!channel.is_alive());
    assert!(!launcher.kill_worker(SlotId(4)));
}

#[tokio::test]
async fn refused_spawns_are_counted() {
    let launcher = FakeLauncher::new();
    launcher.refuse_spawns(1);
    let spec = LaunchSpec::new("fake-worker", SlotId(0));
    assert!(matches!(
        launcher.spawn(&spec).await,
        Err(SpawnError::Refused(_))
    ));
    assert!(launcher.spawn(&spec).await.is_ok());
    assert_eq!(launcher.spawn_count(), 2);
}

#[tokio::test]
async fn shutdown_ends_worker() {
    let launcher = FakeLauncher::new();
    let mut channel = spawn(&launcher, 0).await;
    channel.send(&Message::Shutdown).await.unwrap();
    assert!(channel.recv().await.is_err());
    assert!(!channel.is_alive());
}

#[tokio::test]
async fn kill_is_recorded() {
    let launcher = FakeLauncher::new();
    let mut channel = spawn(&launcher, 2).await;
    channel.kill().await.unwrap();
    assert!(!channel.is_alive());
    assert!(launcher
        .calls()
        .iter()
        .any(|c| matches!(c, LauncherCall::Kill { slot } if *slot == SlotId(2))));
}
