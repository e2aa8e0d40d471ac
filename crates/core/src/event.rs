// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events published on the progress bus

use crate::asset::{AssetId, AssetPath};
use crate::hash::ContentHash;
use crate::job::{FailureReason, JobId, LogSeverity, TransformStatus};
use crate::slot::{OrchestratorState, SlotId};
use serde::{Deserialize, Serialize};

/// Observable facts about a build session.
///
/// Serializes with `{"type": "scope:name", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // -- orchestrator --
    #[serde(rename = "orchestrator:state")]
    OrchestratorState { state: OrchestratorState },

    /// Nothing in flight, nothing to probe, nothing ready
    #[serde(rename = "orchestrator:idle")]
    OrchestratorIdle,

    // -- slot --
    #[serde(rename = "slot:idle")]
    SlotIdle { slot: SlotId },

    #[serde(rename = "slot:busy")]
    SlotBusy {
        slot: SlotId,
        job: JobId,
        asset: AssetId,
    },

    #[serde(rename = "slot:crashed")]
    SlotCrashed {
        slot: SlotId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        job: Option<JobId>,
        consecutive_crashes: u32,
    },

    #[serde(rename = "slot:restarting")]
    SlotRestarting { slot: SlotId },

    #[serde(rename = "slot:disabled")]
    SlotDisabled { slot: SlotId, reason: String },

    #[serde(rename = "slot:offline")]
    SlotOffline { slot: SlotId },

    // -- job --
    #[serde(rename = "job:dispatched")]
    JobDispatched {
        job: JobId,
        asset: AssetId,
        path: AssetPath,
        slot: SlotId,
        attempt: u32,
    },

    #[serde(rename = "job:progress")]
    JobProgress {
        job: JobId,
        asset: AssetId,
        fraction: f32,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        label: String,
    },

    #[serde(rename = "job:log")]
    JobLog {
        job: JobId,
        asset: AssetId,
        severity: LogSeverity,
        text: String,
    },

    #[serde(rename = "job:completed")]
    JobCompleted {
        job: JobId,
        asset: AssetId,
        status: TransformStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_hash: Option<ContentHash>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<FailureReason>,
    },

    /// A crashed job was closed without commit and will be dispatched again
    #[serde(rename = "job:requeued")]
    JobRequeued { job: JobId, asset: AssetId },

    // -- asset --
    #[serde(rename = "asset:discovered")]
    AssetDiscovered { asset: AssetId, path: AssetPath },

    #[serde(rename = "asset:removed")]
    AssetRemoved { asset: AssetId },

    #[serde(rename = "asset:dirty")]
    AssetDirty { asset: AssetId },

    /// An asset failed without a job ever running (cycle, no workers)
    #[serde(rename = "asset:failed")]
    AssetFailed {
        asset: AssetId,
        reason: FailureReason,
    },

    #[serde(rename = "asset:dependency_cycle")]
    DependencyCycle { cycle: Vec<AssetId> },
}

impl Event {
    pub fn name(&self) -> &str {
        match self {
            Event::OrchestratorState { .. } => "orchestrator:state",
            Event::OrchestratorIdle => "orchestrator:idle",
            Event::SlotIdle { .. } => "slot:idle",
            Event::SlotBusy { .. } => "slot:busy",
            Event::SlotCrashed { .. } => "slot:crashed",
            Event::SlotRestarting { .. } => "slot:restarting",
            Event::SlotDisabled { .. } => "slot:disabled",
            Event::SlotOffline { .. } => "slot:offline",
            Event::JobDispatched { .. } => "job:dispatched",
            Event::JobProgress { .. } => "job:progress",
            Event::JobLog { .. } => "job:log",
            Event::JobCompleted { .. } => "job:completed",
            Event::JobRequeued { .. } => "job:requeued",
            Event::AssetDiscovered { .. } => "asset:discovered",
            Event::AssetRemoved { .. } => "asset:removed",
            Event::AssetDirty { .. } => "asset:dirty",
            Event::AssetFailed { .. } => "asset:failed",
            Event::DependencyCycle { .. } => "asset:dependency_cycle",
        }
    }

    /// One-line summary for logs.
    pub fn log_summary(&self) -> String {
        let t = self.name();
        match self {
            Event::OrchestratorState { state } => format!("{t} state={state}"),
            Event::OrchestratorIdle => t.to_string(),
            Event::SlotIdle { slot }
            | Event::SlotRestarting { slot }
            | Event::SlotOffline { slot } => format!("{t} slot={slot}"),
            Event::SlotBusy { slot, job, asset } => {
                format!("{t} slot={slot} job={job} asset={asset}")
            }
            Event::SlotCrashed {
                slot,
                consecutive_crashes,
                ..
            } => format!("{t} slot={slot} crashes={consecutive_crashes}"),
            Event::SlotDisabled { slot, reason } => format!("{t} slot={slot} reason={reason}"),
            Event::JobDispatched {
                job,
                path,
                slot,
                attempt,
                ..
            } => format!("{t} job={job} path={path} slot={slot} attempt={attempt}"),
            Event::JobProgress { job, fraction, .. } => {
                format!("{t} job={job} fraction={fraction:.2}")
            }
            Event::JobLog { job, severity, .. } => format!("{t} job={job} severity={severity:?}"),
            Event::JobCompleted { job, status, .. } => format!("{t} job={job} status={status}"),
            Event::JobRequeued { job, asset } => format!("{t} job={job} asset={asset}"),
            Event::AssetDiscovered { asset, path } => format!("{t} asset={asset} path={path}"),
            Event::AssetRemoved { asset } | Event::AssetDirty { asset } => {
                format!("{t} asset={asset}")
            }
            Event::AssetFailed { asset, reason } => format!("{t} asset={asset} reason={reason}"),
            Event::DependencyCycle { cycle } => format!("{t} len={}", cycle.len()),
        }
    }

    /// The asset this event is about, if any.
    pub fn asset(&self) -> Option<&AssetId> {
        match self {
            Event::SlotBusy { asset, .. }
            | Event::JobDispatched { asset, .. }
            | Event::JobProgress { asset, .. }
            | Event::JobLog { asset, .. }
            | Event::JobCompleted { asset, .. }
            | Event::JobRequeued { asset, .. }
            | Event::AssetDiscovered { asset, .. }
            | Event::AssetRemoved { asset }
            | Event::AssetDirty { asset }
            | Event::AssetFailed { asset, .. } => Some(asset),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
