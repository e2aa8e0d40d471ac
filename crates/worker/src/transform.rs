// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The transform handler contract

use kiln_core::{AssetId, AssetPath, ContentHash, LogSeverity};
use kiln_wire::{Message, TransformRequest};
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors a transform reports back as a failed result
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Config(String),
    #[error("{0}")]
    Failed(String),
}

impl TransformError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// What a transform is asked to build
#[derive(Debug, Clone, PartialEq)]
pub struct TransformInput {
    pub asset: AssetId,
    /// Path relative to the asset root
    pub path: AssetPath,
    /// Absolute location of the source bytes
    pub source: PathBuf,
    pub config: serde_json::Value,
    /// Where products go; transforms that write files require it
    pub output_dir: Option<PathBuf>,
}

impl From<TransformRequest> for TransformInput {
    fn from(req: TransformRequest) -> Self {
        Self {
            asset: req.asset,
            path: req.path,
            source: req.source,
            config: req.config,
            output_dir: req.output_dir,
        }
    }
}

impl TransformInput {
    /// `output_dir` joined with `path` plus `suffix`, parents created.
    pub fn output_path(&self, suffix: &str) -> Result<Option<PathBuf>, TransformError> {
        let Some(dir) = &self.output_dir else {
            return Ok(None);
        };
        let mut target = self.path.resolve(dir).into_os_string();
        target.push(suffix);
        let target = PathBuf::from(target);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TransformError::io(parent, e))?;
        }
        Ok(Some(target))
    }
}

/// A successful transform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    /// Digest of the product
    pub output_hash: ContentHash,
    /// Small result payload passed back to the orchestrator
    pub data: Vec<u8>,
}

impl TransformOutput {
    pub fn new(output_hash: ContentHash) -> Self {
        Self {
            output_hash,
            data: Vec::new(),
        }
    }
}

/// Streams progress and log lines to the orchestrator while a transform
/// runs.
#[derive(Clone)]
pub struct Reporter {
    tx: mpsc::UnboundedSender<Message>,
}

impl Reporter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn progress(&self, fraction: f32, label: impl Into<String>) {
        let _ = self.tx.send(Message::progress(fraction, label));
    }

    pub fn log(&self, severity: LogSeverity, text: impl Into<String>) {
        let _ = self.tx.send(Message::log(severity, text));
    }

    pub fn info(&self, text: impl Into<String>) {
        self.log(LogSeverity::Info, text);
    }

    pub fn warn(&self, text: impl Into<String>) {
        self.log(LogSeverity::Warning, text);
    }
}

/// A named operation the worker can run.
///
/// `run` is called on the blocking pool, so it may do file I/O directly.
pub trait Transform: Send + Sync + 'static {
    fn run(
        &self,
        input: &TransformInput,
        reporter: &Reporter,
    ) -> Result<TransformOutput, TransformError>;
}
