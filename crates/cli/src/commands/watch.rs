// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `kiln watch`: keep building as sources change.

use super::report::BuildReport;
use crate::output::OutputFormat;
use crate::project::Project;
use anyhow::{Context, Result};
use kiln_core::{AssetDecl, AssetId, AssetPath, Event, FingerprintIndex, OrchestratorState};
use kiln_engine::Orchestrator;
use notify::{EventKind, RecursiveMode, Watcher};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

pub async fn handle(project: &Project, format: OutputFormat) -> Result<()> {
    let _lock = project.state.lock()?;
    let orch = project.persistent_orchestrator()?;
    project.sync(&orch).await?;

    let asset_root = project.asset_root();
    let asset_root = asset_root
        .canonicalize()
        .with_context(|| format!("asset root {} not found", asset_root.display()))?;

    let (tx, mut changes) = mpsc::unbounded_channel::<Vec<PathBuf>>();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) if is_content_change(&event.kind) => {
                let _ = tx.send(event.paths);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "file watcher error"),
        }
    })?;
    watcher.watch(&asset_root, RecursiveMode::Recursive)?;

    let paths = project.asset_paths();
    let decls: HashMap<AssetId, AssetDecl> = project
        .config
        .decls()
        .into_iter()
        .map(|decl| (decl.id, decl))
        .collect();
    let mut events = orch.subscribe();
    let mut report = BuildReport::new(project);
    orch.start().await?;
    tracing::info!(root = %asset_root.display(), assets = paths.len(), "watching");
    eprintln!(
        "watching {} ({} assets), Ctrl-C to stop",
        asset_root.display(),
        paths.len()
    );

    let mut interrupts = 0;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                interrupts += 1;
                // First Ctrl-C lets running jobs finish, the second cancels them
                let force = interrupts > 1;
                if !force {
                    eprintln!("stopping, Ctrl-C again to cancel running jobs");
                }
                if let Err(e) = orch.stop(force).await {
                    tracing::warn!(error = %e, "stop rejected");
                }
            }
            Some(changed) = changes.recv() => {
                for change in plan_changes(&asset_root, &changed, &paths) {
                    apply(&orch, &decls, change).await?;
                }
            }
            Some(event) = events.recv() => {
                let stopped = matches!(
                    event,
                    Event::OrchestratorState { state: OrchestratorState::Stopped }
                );
                show(&mut report, &event, format)?;
                if stopped {
                    break;
                }
            }
        }
    }

    drop(watcher);
    if format == OutputFormat::Text {
        let index = FingerprintIndex::from_snapshot(project.asset_root(), orch.snapshot().await?);
        for line in report.settle(&index) {
            println!("{line}");
        }
        println!("{}", report.summary());
    }
    Ok(())
}

/// What a batch of file events means for one declared asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceChange {
    /// The source exists: edited, created or restored
    Changed(AssetId),
    /// The source is gone from disk
    Removed(AssetId),
}

/// A deleted source drops its asset from the index. A source that comes
/// back is declared again from `kiln.toml`, and any other change forces a
/// rebuild.
async fn apply(
    orch: &Orchestrator,
    decls: &HashMap<AssetId, AssetDecl>,
    change: SourceChange,
) -> Result<()> {
    match change {
        SourceChange::Removed(asset) => {
            if orch.remove(asset).await? {
                tracing::info!(asset = %asset, "source removed");
            }
        }
        SourceChange::Changed(asset) => {
            let restored = match decls.get(&asset) {
                Some(decl) => orch.discover(decl.clone()).await?,
                None => false,
            };
            if restored {
                tracing::info!(asset = %asset, "source restored");
            } else {
                tracing::info!(asset = %asset, "source changed");
                orch.mark_dirty(asset).await?;
            }
        }
    }
    Ok(())
}

fn show(report: &mut BuildReport, event: &Event, format: OutputFormat) -> Result<()> {
    tracing::debug!("{}", event.log_summary());
    let line = report.observe(event);
    match format {
        OutputFormat::Text => {
            if let Some(line) = line {
                println!("{line}");
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(event)?),
    }
    Ok(())
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Map changed files to the declared assets they are sources of.
///
/// Paths outside `root` and files no asset declares are ignored. Each
/// asset appears once, in order of first change, and whether its source
/// still exists is checked when the batch is planned, not per event.
pub fn plan_changes(
    root: &Path,
    changed: &[PathBuf],
    assets: &HashMap<AssetPath, AssetId>,
) -> Vec<SourceChange> {
    let mut seen = HashSet::new();
    changed
        .iter()
        .filter_map(|path| {
            let relative = path.strip_prefix(root).ok()?;
            let asset_path = AssetPath::parse(&relative.to_string_lossy()).ok()?;
            let asset = *assets.get(&asset_path)?;
            Some((asset, path))
        })
        .filter(|(asset, _)| seen.insert(*asset))
        .map(|(asset, path)| {
            if path.exists() {
                SourceChange::Changed(asset)
            } else {
                SourceChange::Removed(asset)
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
