// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the CLI crate.

use std::path::{Path, PathBuf};

// --- State directory ---

/// Resolve state directory: KILN_STATE_DIR > `<project>/.kiln`
pub fn state_dir(project_root: &Path) -> PathBuf {
    match std::env::var("KILN_STATE_DIR") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => project_root.join(".kiln"),
    }
}

// --- Worker binary ---

/// Resolve the worker program: KILN_WORKER_BIN > `kiln-worker` next to
/// the running executable > `kiln-worker` on PATH
pub fn worker_binary() -> PathBuf {
    if let Ok(bin) = std::env::var("KILN_WORKER_BIN") {
        if !bin.is_empty() {
            return PathBuf::from(bin);
        }
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("kiln-worker")))
        .filter(|sibling| sibling.exists())
        .unwrap_or_else(|| PathBuf::from("kiln-worker"))
}

// --- Logging ---

/// Log filter directives: KILN_LOG > RUST_LOG
pub fn log_filter() -> Option<String> {
    std::env::var("KILN_LOG")
        .ok()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .filter(|s| !s.is_empty())
}

// --- Color ---

pub fn no_color() -> bool {
    std::env::var("NO_COLOR").is_ok_and(|v| v == "1")
}

pub fn force_color() -> bool {
    std::env::var("COLOR").is_ok_and(|v| v == "1")
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
