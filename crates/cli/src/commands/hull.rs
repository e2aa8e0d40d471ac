// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `kiln hull`: every direct and indirect dependency of an asset.

use crate::output::{print_json, OutputFormat};
use crate::project::Project;
use anyhow::{Context, Result};
use kiln_storage::NoopStore;
use serde::Serialize;
use std::sync::Arc;

#[derive(clap::Args)]
pub struct HullArgs {
    /// Asset path or id
    pub asset: String,
}

#[derive(Serialize)]
struct HullEntry {
    id: String,
    path: String,
}

pub async fn handle(project: &Project, args: HullArgs, format: OutputFormat) -> Result<()> {
    let entry = project
        .config
        .find_asset(&args.asset)
        .with_context(|| format!("unknown asset: {}", args.asset))?;

    // The graph comes from kiln.toml alone; nothing is built or saved
    let orch = project.orchestrator(Arc::new(NoopStore))?;
    project.sync(&orch).await?;
    let hull = orch.hull(entry.id).await?;

    let entries: Vec<HullEntry> = hull
        .iter()
        .map(|id| HullEntry {
            id: id.to_string(),
            path: project.describe(id),
        })
        .collect();

    match format {
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("{} has no dependencies", entry.path);
            }
            for e in &entries {
                println!("{}", e.path);
            }
        }
        OutputFormat::Json => print_json(&entries)?,
    }
    Ok(())
}
