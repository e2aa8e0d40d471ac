// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fingerprint stores: where the orchestrator persists its index.

use crate::snapshot::{Snapshot, SnapshotError};
use kiln_core::IndexSnapshot;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Persistence collaborator for the fingerprint index.
pub trait FingerprintStore: Send + Sync + 'static {
    /// Load the last saved index, if any.
    fn load(&self) -> Result<Option<IndexSnapshot>, SnapshotError>;

    /// Durably replace the saved index.
    fn save(&self, index: &IndexSnapshot) -> Result<(), SnapshotError>;
}

/// JSON snapshot file on disk
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FingerprintStore for SnapshotStore {
    fn load(&self) -> Result<Option<IndexSnapshot>, SnapshotError> {
        Ok(Snapshot::load(&self.path)?.map(|s| s.index))
    }

    fn save(&self, index: &IndexSnapshot) -> Result<(), SnapshotError> {
        let start = std::time::Instant::now();
        Snapshot::new(index.clone()).save(&self.path)?;
        tracing::debug!(
            records = index.records.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            path = %self.path.display(),
            "index saved"
        );
        Ok(())
    }
}

/// Store that keeps nothing
#[derive(Debug, Clone, Default)]
pub struct NoopStore;

impl FingerprintStore for NoopStore {
    fn load(&self) -> Result<Option<IndexSnapshot>, SnapshotError> {
        Ok(None)
    }

    fn save(&self, _index: &IndexSnapshot) -> Result<(), SnapshotError> {
        Ok(())
    }
}

/// In-memory store that remembers the last save
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreState>>,
}

#[derive(Debug, Default)]
struct MemoryStoreState {
    saved: Option<IndexSnapshot>,
    saves: u32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a previously saved index
    pub fn with_snapshot(index: IndexSnapshot) -> Self {
        let store = Self::default();
        store.inner.lock().saved = Some(index);
        store
    }

    pub fn saved(&self) -> Option<IndexSnapshot> {
        self.inner.lock().saved.clone()
    }

    pub fn save_count(&self) -> u32 {
        self.inner.lock().saves
    }
}

impl FingerprintStore for MemoryStore {
    fn load(&self) -> Result<Option<IndexSnapshot>, SnapshotError> {
        Ok(self.inner.lock().saved.clone())
    }

    fn save(&self, index: &IndexSnapshot) -> Result<(), SnapshotError> {
        let mut inner = self.inner.lock();
        inner.saved = Some(index.clone());
        inner.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
