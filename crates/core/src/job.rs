// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Jobs: one in-flight transform request for a single asset.

use crate::asset::{AssetId, AssetPath};
use crate::hash::ContentHash;
use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Unique identifier for one dispatched job.
    pub struct JobId;
}

/// Result of the most recent transform of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformStatus {
    #[default]
    Unknown,
    Success,
    Failed,
    Cancelled,
}

impl fmt::Display for TransformStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformStatus::Unknown => write!(f, "unknown"),
            TransformStatus::Success => write!(f, "success"),
            TransformStatus::Failed => write!(f, "failed"),
            TransformStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Why a job (or an asset without a job) ended up failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// The worker ran the transform and reported failure
    Transform(String),
    /// The slot's retry ceiling was exceeded, or no slot can run jobs
    WorkerUnavailable,
    /// The asset is part of a dependency cycle (cycle path as text)
    DependencyCycle(String),
    /// A declared dependency is not in the index
    MissingDependency(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Transform(msg) => write!(f, "transform failed: {}", msg),
            FailureReason::WorkerUnavailable => write!(f, "worker unavailable"),
            FailureReason::DependencyCycle(cycle) => write!(f, "dependency cycle: {}", cycle),
            FailureReason::MissingDependency(id) => write!(f, "missing dependency: {}", id),
        }
    }
}

/// Severity of a log line streamed back by a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub severity: LogSeverity,
    pub text: String,
}

/// Hashes a job was dispatched against. Committed on completion so the
/// index knows exactly which inputs the output corresponds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInputs {
    /// `None` when the source could not be read at dispatch
    pub source_hash: Option<ContentHash>,
    pub dependency_hash: ContentHash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub asset: AssetId,
    pub path: AssetPath,
    pub operation: String,
    /// Opaque operation settings, passed through to the worker
    #[serde(default)]
    pub config: serde_json::Value,
    pub inputs: JobInputs,
    pub enqueued_at_ms: u64,
    /// 1 for the first dispatch; bumped when a crashed job is requeued
    pub attempt: u32,
}

/// Terminal outcome of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded {
        output_hash: ContentHash,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        data: Vec<u8>,
    },
    Failed {
        reason: FailureReason,
    },
    Cancelled,
}

impl JobOutcome {
    pub fn failed(reason: FailureReason) -> Self {
        JobOutcome::Failed { reason }
    }

    pub fn status(&self) -> TransformStatus {
        match self {
            JobOutcome::Succeeded { .. } => TransformStatus::Success,
            JobOutcome::Failed { .. } => TransformStatus::Failed,
            JobOutcome::Cancelled => TransformStatus::Cancelled,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded { .. })
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
