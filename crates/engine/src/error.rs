// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine

use kiln_adapters::ChannelError;
use kiln_core::{IndexError, OrchestratorState, SlotState};
use kiln_storage::SnapshotError;
use thiserror::Error;

/// Errors returned through the orchestrator handle
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("cannot {op} while {state}")]
    InvalidTransition {
        op: &'static str,
        state: OrchestratorState,
    },
    #[error("orchestrator has shut down")]
    Closed,
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("fingerprint store: {0}")]
    Store(#[from] SnapshotError),
}

/// Errors from driving a single slot
#[derive(Debug, Error)]
pub enum SlotError {
    #[error("slot is {0}, not idle")]
    NotIdle(SlotState),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}
