// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Source probing off the control task.
//!
//! Hashing runs on the blocking pool, bounded by a semaphore. Results come
//! back to the control task as messages; the control task alone applies
//! them to the index.

use kiln_core::{AssetId, ContentHash};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

/// Outcome of hashing one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub asset: AssetId,
    /// Identifies the request, so superseded results can be dropped
    pub seq: u64,
    /// `None` if the file could not be read
    pub hash: Option<ContentHash>,
}

pub struct ProbePool {
    permits: Arc<Semaphore>,
    tx: mpsc::UnboundedSender<ProbeResult>,
}

impl ProbePool {
    pub fn new(concurrency: usize, tx: mpsc::UnboundedSender<ProbeResult>) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            tx,
        }
    }

    /// Hash `path` in the background and report it as `asset`.
    pub fn probe(&self, asset: AssetId, seq: u64, path: PathBuf) {
        let permits = Arc::clone(&self.permits);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            let hash = tokio::task::spawn_blocking(move || match ContentHash::of_file(&path) {
                Ok(hash) => Some(hash),
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "source unreadable");
                    None
                }
            })
            .await
            .unwrap_or(None);
            let _ = tx.send(ProbeResult { asset, seq, hash });
        });
    }
}

#[cfg(test)]
#[path = "probe_tests.rs"]
mod tests;
