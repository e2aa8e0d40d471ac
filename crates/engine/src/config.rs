// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// What to do with the job of a worker that crashed mid-transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrashPolicy {
    /// Close the job without committing; the asset stays dirty and is
    /// dispatched again
    #[default]
    Requeue,
    /// Commit the job as cancelled
    Cancel,
}

/// How to launch workers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Operations the workers must provide
    pub operations: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            operations: Vec::new(),
            env: Vec::new(),
        }
    }
}

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Directory asset paths are relative to
    pub asset_root: PathBuf,
    /// Passed to workers as the place to write products
    pub output_dir: Option<PathBuf>,
    pub worker: WorkerCommand,
    /// Number of worker slots
    pub slots: u32,
    /// Consecutive crashes a slot tolerates before it is disabled
    pub retry_ceiling: u32,
    pub crash_policy: CrashPolicy,
    /// Escalate a graceful stop to a forced one after this long
    pub stop_timeout: Option<Duration>,
    /// Concurrent source-hashing tasks
    pub probe_concurrency: usize,
    /// How often committed results are persisted
    pub checkpoint_interval: Duration,
}

impl OrchestratorConfig {
    pub fn new(asset_root: impl Into<PathBuf>, worker: WorkerCommand) -> Self {
        Self {
            asset_root: asset_root.into(),
            output_dir: None,
            worker,
            slots: 2,
            retry_ceiling: 3,
            crash_policy: CrashPolicy::default(),
            stop_timeout: None,
            probe_concurrency: 4,
            checkpoint_interval: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
