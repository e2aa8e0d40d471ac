// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project state directory: index snapshot, lock and log files

use fs2::FileExt;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("another kiln is building this project (lock held on {})", path.display())]
    Locked {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("state directory {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Paths under the state directory
#[derive(Debug, Clone)]
pub struct StateDir {
    root: PathBuf,
}

impl StateDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join("index.json")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join("kiln.lock")
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join("kiln.log")
    }

    /// Create the directory and take the exclusive build lock.
    pub fn lock(&self) -> Result<StateLock, StateError> {
        let io_err = |source| StateError::Io {
            path: self.root.clone(),
            source,
        };
        std::fs::create_dir_all(&self.root).map_err(io_err)?;

        let path = self.lock_path();
        // Open without truncating so a held lock's PID survives
        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(io_err)?;
        file.try_lock_exclusive()
            .map_err(|source| StateError::Locked { path, source })?;

        let mut file = file;
        file.set_len(0).map_err(io_err)?;
        writeln!(file, "{}", std::process::id()).map_err(io_err)?;
        Ok(StateLock { _file: file })
    }
}

/// Exclusive lock on the state directory, released on drop
#[derive(Debug)]
pub struct StateLock {
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    _file: File,
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
