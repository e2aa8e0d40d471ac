// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `kiln build`: bring every asset up to date, then exit.

use super::report::{BuildReport, Outcome};
use crate::exit_error::ExitError;
use crate::output::{print_json, OutputFormat};
use crate::project::Project;
use anyhow::{Context, Result};
use kiln_core::{AssetId, Event, FingerprintIndex, OrchestratorState};
use kiln_engine::Orchestrator;

#[derive(clap::Args)]
pub struct BuildArgs {
    /// Rebuild every asset, even those that are up to date
    #[arg(long)]
    pub force: bool,

    /// Assets (path or id) to rebuild even if up to date
    pub assets: Vec<String>,
}

pub async fn handle(project: &Project, args: BuildArgs, format: OutputFormat) -> Result<()> {
    let _lock = project.state.lock()?;
    let orch = project.persistent_orchestrator()?;
    let sync = project.sync(&orch).await?;
    tracing::debug!(added = sync.added, removed = sync.removed, "synced");

    for asset in forced_assets(project, &args)? {
        orch.mark_dirty(asset).await?;
    }

    let mut events = orch.subscribe();
    let mut report = BuildReport::new(project);
    orch.start().await?;

    let mut interrupted = false;
    {
        let idle = orch.wait_idle();
        tokio::pin!(idle);
        loop {
            tokio::select! {
                result = &mut idle => {
                    result?;
                    break;
                }
                Some(event) = events.recv() => show(&mut report, &event, format),
                _ = tokio::signal::ctrl_c() => {
                    eprintln!("interrupted, cancelling running jobs");
                    orch.stop(true).await?;
                    interrupted = true;
                    break;
                }
            }
        }
    }

    shut_down(&orch).await?;
    while let Some(event) = events.try_recv() {
        show(&mut report, &event, format);
    }

    let index = FingerprintIndex::from_snapshot(project.asset_root(), orch.snapshot().await?);
    for line in report.settle(&index) {
        if format == OutputFormat::Text {
            println!("{line}");
        }
    }

    match format {
        OutputFormat::Text => println!("{}", report.summary()),
        OutputFormat::Json => print_json(&report.to_json())?,
    }

    if interrupted {
        return Err(ExitError::new(130, "build interrupted").into());
    }
    let failed = report.count(Outcome::Failed);
    let blocked = report.count(Outcome::Blocked);
    if failed + blocked > 0 {
        return Err(ExitError::new(1, stale_message(failed, blocked)).into());
    }
    Ok(())
}

/// Why the build did not leave every asset up to date
fn stale_message(failed: usize, blocked: usize) -> String {
    match (failed, blocked) {
        (f, 0) => format!("{f} asset(s) failed to build"),
        (0, b) => format!("{b} asset(s) blocked"),
        (f, b) => format!("{f} asset(s) failed to build, {b} blocked"),
    }
}

/// Assets to mark dirty before starting
fn forced_assets(project: &Project, args: &BuildArgs) -> Result<Vec<AssetId>> {
    if args.force {
        return Ok(project.config.assets.iter().map(|a| a.id).collect());
    }
    args.assets
        .iter()
        .map(|key| {
            project
                .config
                .find_asset(key)
                .map(|a| a.id)
                .with_context(|| format!("unknown asset: {key}"))
        })
        .collect()
}

fn show(report: &mut BuildReport, event: &Event, format: OutputFormat) {
    tracing::debug!("{}", event.log_summary());
    if let Some(line) = report.observe(event) {
        if format == OutputFormat::Text {
            println!("{line}");
        }
    }
}

/// Stop gracefully (unless already stopping) and wait for `Stopped`
async fn shut_down(orch: &Orchestrator) -> Result<()> {
    if orch.state() == OrchestratorState::Running {
        orch.stop(false).await?;
    }
    orch.wait_for_state(OrchestratorState::Stopped).await?;
    Ok(())
}
