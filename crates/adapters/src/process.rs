// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Launcher for real worker subprocesses.

use crate::transport::{Channel, ChannelError, LaunchSpec, Launcher, SpawnError, WorkerProcess};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::{Child, Command};

/// Spawns workers as child processes with frames on stdin/stdout.
///
/// stderr is inherited so worker logs land next to the orchestrator's.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher;

impl ProcessLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Launcher for ProcessLauncher {
    async fn spawn(&self, spec: &LaunchSpec) -> Result<Channel, SpawnError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(spec.command_args())
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SpawnError::NotFound(spec.program.clone()),
            _ => SpawnError::Io {
                program: spec.program.clone(),
                source: e,
            },
        })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.start_kill();
            return Err(SpawnError::Refused("worker pipes unavailable".to_string()));
        };

        Ok(Channel::new(
            Box::new(stdout),
            Box::new(stdin),
            Box::new(ChildProcess { child }),
        ))
    }
}

struct ChildProcess {
    child: Child,
}

#[async_trait]
impl WorkerProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    async fn kill(&mut self) -> Result<(), ChannelError> {
        if !self.is_alive() {
            return Ok(());
        }
        self.child
            .kill()
            .await
            .map_err(|e| ChannelError::Broken(format!("kill failed: {e}")))
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
