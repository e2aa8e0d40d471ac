// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Kiln build engine: worker slots, the event bus and the orchestrator

mod config;
mod error;
mod event_bus;
mod orchestrator;
mod probe;
mod slot;

pub use config::{CrashPolicy, OrchestratorConfig, WorkerCommand};
pub use error::{OrchestratorError, SlotError};
pub use event_bus::{EventBus, Subscription, SubscriptionId};
pub use orchestrator::{Orchestrator, OrchestratorDeps, SlotInfo};
pub use slot::{Slot, SlotEvent, SlotOptions};
