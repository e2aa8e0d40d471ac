// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker slot identity and lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a worker slot within the orchestrator's pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(pub u32);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a worker slot.
///
/// `Offline → Idle → Busy → Idle` on the happy path; a crash moves through
/// `Crashed → Restarting → Idle`, or to `Disabled` once the retry ceiling
/// is exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    /// No process (never started, or shut down)
    #[default]
    Offline,
    Idle,
    Busy,
    Crashed,
    Restarting,
    /// Crashed too often, or the process could not be spawned
    Disabled,
}

impl SlotState {
    /// Whether a job may be assigned in this state
    pub fn accepts_jobs(&self) -> bool {
        matches!(self, SlotState::Idle)
    }

    /// Whether the slot can still make progress without a fresh start
    pub fn is_usable(&self) -> bool {
        !matches!(self, SlotState::Disabled | SlotState::Offline)
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SlotState::Offline => "offline",
            SlotState::Idle => "idle",
            SlotState::Busy => "busy",
            SlotState::Crashed => "crashed",
            SlotState::Restarting => "restarting",
            SlotState::Disabled => "disabled",
        };
        f.write_str(s)
    }
}

/// Lifecycle state of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    #[default]
    Stopped,
    Running,
    Stopping,
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrchestratorState::Stopped => "stopped",
            OrchestratorState::Running => "running",
            OrchestratorState::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
#[path = "slot_tests.rs"]
mod tests;
