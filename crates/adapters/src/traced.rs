// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced launcher wrapper for consistent observability

use crate::transport::{Channel, LaunchSpec, Launcher, SpawnError};
use async_trait::async_trait;
use tracing::Instrument;

/// Wrapper that adds tracing to any Launcher
#[derive(Clone)]
pub struct TracedLauncher<L> {
    inner: L,
}

impl<L> TracedLauncher<L> {
    pub fn new(inner: L) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }
}

#[async_trait]
impl<L: Launcher> Launcher for TracedLauncher<L> {
    async fn spawn(&self, spec: &LaunchSpec) -> Result<Channel, SpawnError> {
        let span = tracing::info_span!(
            "worker.spawn",
            slot = %spec.slot,
            program = %spec.program.display()
        );
        async {
            tracing::info!(operations = spec.operations.len(), "starting");
            let start = std::time::Instant::now();
            let result = self.inner.spawn(spec).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(channel) => tracing::info!(pid = ?channel.pid(), elapsed_ms, "worker spawned"),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "spawn failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
