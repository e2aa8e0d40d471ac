// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `kiln status`: what the saved index says about each declared asset.
//!
//! Reads the snapshot directly; no orchestrator or worker is started.

use crate::output::{format_time_ago, print_json, OutputFormat};
use crate::project::Project;
use crate::table::{Column, Table};
use anyhow::Result;
use kiln_core::{Clock, ContentHash, IndexSnapshot, SystemClock, TransformStatus};
use kiln_storage::Snapshot;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRow {
    pub path: String,
    pub id: String,
    pub operation: String,
    /// new, success, modified, missing, failed, cancelled or unknown
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempt_ms: Option<u64>,
}

pub fn handle(project: &Project, format: OutputFormat) -> Result<()> {
    let index = Snapshot::load(&project.state.index_path())?
        .map(|s| s.index)
        .unwrap_or_default();
    let asset_root = project.asset_root();
    let rows = status_rows(project, &index, &asset_root);

    match format {
        OutputFormat::Text => {
            if rows.is_empty() {
                println!("No assets declared");
                return Ok(());
            }
            let now = SystemClock.epoch_ms();
            let mut table = Table::new(vec![
                Column::left("PATH"),
                Column::left("OPERATION"),
                Column::status("STATUS"),
                Column::muted("OUTPUT"),
                Column::muted("BUILT"),
            ]);
            for row in &rows {
                let status = match &row.reason {
                    Some(reason) => format!("{}: {reason}", row.status),
                    None => row.status.clone(),
                };
                table.row(vec![
                    row.path.clone(),
                    row.operation.clone(),
                    status,
                    row.output_hash.clone().unwrap_or_else(|| "-".to_string()),
                    format_time_ago(row.last_attempt_ms, now),
                ]);
            }
            table.render(&mut std::io::stdout())?;

            let pending = rows.iter().filter(|r| r.status != "success").count();
            println!();
            println!("{} assets, {pending} need building", rows.len());
        }
        OutputFormat::Json => print_json(&rows)?,
    }
    Ok(())
}

/// One row per declared asset, in declaration order.
///
/// A successful record whose source bytes no longer match what was
/// built shows as `modified`; an unreadable source shows as `missing`.
pub fn status_rows(project: &Project, index: &IndexSnapshot, asset_root: &Path) -> Vec<StatusRow> {
    project
        .config
        .assets
        .iter()
        .map(|entry| {
            let record = index.get(&entry.id);
            let current = ContentHash::of_file(&entry.path.resolve(asset_root)).ok();
            let status = match record {
                _ if current.is_none() => "missing".to_string(),
                None => "new".to_string(),
                Some(r) if r.last_status == TransformStatus::Success => {
                    if r.built_source_hash == current {
                        "success".to_string()
                    } else {
                        "modified".to_string()
                    }
                }
                Some(r) => r.last_status.to_string(),
            };
            StatusRow {
                path: entry.path.to_string(),
                id: entry.id.to_string(),
                operation: entry.operation.clone(),
                status,
                reason: record.and_then(|r| r.last_failure.as_ref().map(ToString::to_string)),
                output_hash: record.and_then(|r| r.last_output_hash.as_ref().map(|h| h.short(12))),
                last_attempt_ms: record.and_then(|r| r.last_attempt_ms),
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
