// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker protocol shared by the orchestrator and worker processes.
//!
//! Wire format: 4-byte length prefix (little-endian) + 1-byte kind + JSON
//! payload. The length counts the kind byte and the payload.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod message;
mod wire;

pub use message::{
    LogLine, Message, MessageKind, ProgressUpdate, ResultStatus, TransformRequest,
    TransformResult,
};
pub use wire::{
    decode, encode, read_message, write_message, ProtocolError, MAX_FRAME_SIZE, MAX_RESULT_DATA,
};
