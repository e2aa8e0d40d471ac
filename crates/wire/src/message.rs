// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol messages exchanged between a slot and its worker process.

use kiln_core::{AssetId, AssetPath, ContentHash, LogSeverity};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Frame kind byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    TransformRequest = 1,
    ProgressUpdate = 2,
    LogLine = 3,
    TransformResult = 4,
    Shutdown = 5,
}

impl MessageKind {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(MessageKind::TransformRequest),
            2 => Some(MessageKind::ProgressUpdate),
            3 => Some(MessageKind::LogLine),
            4 => Some(MessageKind::TransformResult),
            5 => Some(MessageKind::Shutdown),
            _ => None,
        }
    }
}

/// Orchestrator → worker: run one transform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformRequest {
    pub asset: AssetId,
    /// Normalized path relative to the asset root
    pub path: AssetPath,
    /// Absolute location of the source bytes
    pub source: PathBuf,
    pub operation: String,
    #[serde(default)]
    pub config: serde_json::Value,
    /// Where the transform should place its products
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

/// Worker → orchestrator: progress of the running transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// 0.0 ..= 1.0
    pub fraction: f32,
    #[serde(default)]
    pub label: String,
}

/// Worker → orchestrator: log output of the running transform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub severity: LogSeverity,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Success,
    Failed,
}

/// Worker → orchestrator: the transform finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformResult {
    pub status: ResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_hash: Option<ContentHash>,
    /// Failure message, empty on success
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    /// Small opaque payload for the caller (hex on the wire)
    #[serde(default, with = "hex_bytes", skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<u8>,
}

impl TransformResult {
    pub fn success(output_hash: ContentHash) -> Self {
        Self {
            status: ResultStatus::Success,
            output_hash: Some(output_hash),
            message: String::new(),
            data: Vec::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: ResultStatus::Failed,
            output_hash: None,
            message: message.into(),
            data: Vec::new(),
        }
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    TransformRequest(TransformRequest),
    ProgressUpdate(ProgressUpdate),
    LogLine(LogLine),
    TransformResult(TransformResult),
    Shutdown,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::TransformRequest(_) => MessageKind::TransformRequest,
            Message::ProgressUpdate(_) => MessageKind::ProgressUpdate,
            Message::LogLine(_) => MessageKind::LogLine,
            Message::TransformResult(_) => MessageKind::TransformResult,
            Message::Shutdown => MessageKind::Shutdown,
        }
    }

    pub fn log(severity: LogSeverity, text: impl Into<String>) -> Self {
        Message::LogLine(LogLine {
            severity,
            text: text.into(),
        })
    }

    pub fn progress(fraction: f32, label: impl Into<String>) -> Self {
        Message::ProgressUpdate(ProgressUpdate {
            fraction: fraction.clamp(0.0, 1.0),
            label: label.into(),
        })
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
