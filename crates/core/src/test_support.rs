// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{AssetDecl, AssetId, AssetPath};
use std::path::Path;

/// Declaration for an asset at `path` using `operation`.
///
/// Panics on an invalid path; meant for literals in tests.
#[allow(clippy::panic)]
pub fn decl(path: &str, operation: &str, deps: &[AssetId]) -> AssetDecl {
    let path = match AssetPath::parse(path) {
        Ok(path) => path,
        Err(e) => panic!("invalid test asset path {path:?}: {e}"),
    };
    AssetDecl::new(AssetId::generate(), path, operation).depends_on(deps.iter().copied())
}

/// Write a source file under `root`, creating parent directories.
pub fn write_source(root: &Path, path: &str, bytes: &[u8]) -> std::io::Result<()> {
    let full = root.join(path);
    if let Some(parent) = full.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(full, bytes)
}
