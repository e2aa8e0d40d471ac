// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Worker side of the Kiln protocol
//!
//! A worker process reads transform requests on stdin, runs the named
//! transform and answers on stdout. Transforms are looked up by name in a
//! [`TransformRegistry`].

mod builtins;
mod registry;
mod serve;
mod transform;

pub use builtins::{ChecksumTransform, CopyTransform};
pub use registry::{RegistryError, TransformRegistry};
pub use serve::serve;
pub use transform::{Reporter, Transform, TransformError, TransformInput, TransformOutput};
