// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kiln-core: Core types for the Kiln asset build orchestrator

pub mod asset;
pub mod clock;
pub mod event;
pub mod fingerprint;
pub mod hash;
pub mod id;
pub mod job;
pub mod slot;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use asset::{AssetDecl, AssetId, AssetPath, AssetPathError};
pub use clock::{Clock, FakeClock, SystemClock};
pub use event::Event;
pub use fingerprint::{
    format_cycle, FingerprintIndex, FingerprintRecord, IndexError, IndexSnapshot, ReadyScan,
};
pub use hash::ContentHash;
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use job::{
    FailureReason, Job, JobId, JobInputs, JobOutcome, LogEntry, LogSeverity, TransformStatus,
};
pub use slot::{OrchestratorState, SlotId, SlotState};
