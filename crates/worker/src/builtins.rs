// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in transforms

use crate::transform::{Reporter, Transform, TransformError, TransformInput, TransformOutput};
use kiln_core::ContentHash;

/// Copies the source into the output directory unchanged.
///
/// Without an output directory nothing is written; the digest of the
/// source is still reported.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyTransform;

impl Transform for CopyTransform {
    fn run(
        &self,
        input: &TransformInput,
        reporter: &Reporter,
    ) -> Result<TransformOutput, TransformError> {
        let bytes =
            std::fs::read(&input.source).map_err(|e| TransformError::io(&input.source, e))?;
        reporter.progress(0.5, "read");

        if let Some(target) = input.output_path("")? {
            std::fs::write(&target, &bytes).map_err(|e| TransformError::io(&target, e))?;
            reporter.info(format!("wrote {}", target.display()));
        }
        reporter.progress(1.0, "written");
        Ok(TransformOutput::new(ContentHash::of(&bytes)))
    }
}

/// Writes `<path>.sha256` next to where a copy would go.
///
/// Result data carries the raw 32-byte digest of the source.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksumTransform;

impl Transform for ChecksumTransform {
    fn run(
        &self,
        input: &TransformInput,
        reporter: &Reporter,
    ) -> Result<TransformOutput, TransformError> {
        match input.config.get("algorithm").and_then(|v| v.as_str()) {
            None | Some("sha256") => {}
            Some(other) => {
                return Err(TransformError::Config(format!(
                    "unsupported algorithm {other:?}"
                )))
            }
        }

        let digest =
            ContentHash::of_file(&input.source).map_err(|e| TransformError::io(&input.source, e))?;
        let line = format!("{}  {}\n", digest.to_hex(), input.path.file_name());

        if let Some(target) = input.output_path(".sha256")? {
            std::fs::write(&target, &line).map_err(|e| TransformError::io(&target, e))?;
        } else {
            reporter.warn("no output directory, checksum not written");
        }
        reporter.progress(1.0, "hashed");
        Ok(TransformOutput {
            output_hash: ContentHash::of(line.as_bytes()),
            data: digest.as_bytes().to_vec(),
        })
    }
}

#[cfg(test)]
#[path = "builtins_tests.rs"]
mod tests;
