// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A loaded project: root directory, `kiln.toml` and state directory

use crate::config::{find_project_root, Config, CONFIG_FILE};
use crate::state::StateDir;
use anyhow::{Context, Result};
use kiln_adapters::{ProcessLauncher, TracedLauncher};
use kiln_core::{AssetId, AssetPath, SystemClock, UuidIdGen};
use kiln_engine::{Orchestrator, OrchestratorDeps};
use kiln_storage::{FingerprintStore, SnapshotStore};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct Project {
    pub root: PathBuf,
    pub config: Config,
    pub state: StateDir,
}

/// What syncing the config into the index changed
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: usize,
    pub removed: usize,
}

impl Project {
    /// Load the project from an explicit config file, or from the nearest
    /// `kiln.toml` at or above `cwd`.
    pub fn load(cwd: &Path, config_path: Option<&Path>) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => cwd.join(path),
            None => find_project_root(cwd)
                .map(|root| root.join(CONFIG_FILE))
                .with_context(|| {
                    format!("no {CONFIG_FILE} found in {} or any parent", cwd.display())
                })?,
        };
        let config = Config::load(&config_path)?;
        let root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.to_path_buf());
        let state = StateDir::new(crate::env::state_dir(&root));
        Ok(Self {
            root,
            config,
            state,
        })
    }

    /// Spawn an orchestrator over this project, persisting to `store`
    pub fn orchestrator(&self, store: Arc<dyn FingerprintStore>) -> Result<Orchestrator> {
        let config = self
            .config
            .orchestrator_config(&self.root, crate::env::worker_binary());
        tracing::debug!(
            worker = %config.worker.program.display(),
            slots = config.slots,
            asset_root = %config.asset_root.display(),
            "opening orchestrator"
        );
        let deps = OrchestratorDeps {
            launcher: TracedLauncher::new(ProcessLauncher::new()),
            store,
            clock: SystemClock,
            ids: UuidIdGen,
        };
        Ok(Orchestrator::spawn(config, deps)?)
    }

    /// Orchestrator persisting to the state directory's index
    pub fn persistent_orchestrator(&self) -> Result<Orchestrator> {
        self.orchestrator(Arc::new(SnapshotStore::new(self.state.index_path())))
    }

    /// Bring the orchestrator's index in line with `kiln.toml`: declare
    /// every configured asset and forget the ones no longer listed.
    pub async fn sync(&self, orch: &Orchestrator) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let declared: HashSet<AssetId> = self.config.assets.iter().map(|a| a.id).collect();

        for record in orch.snapshot().await?.records {
            if !declared.contains(&record.id) && orch.remove(record.id).await? {
                report.removed += 1;
            }
        }
        for decl in self.config.decls() {
            if orch.discover(decl).await? {
                report.added += 1;
            }
        }
        tracing::info!(added = report.added, removed = report.removed, "index synced");
        Ok(report)
    }

    /// Directory asset paths resolve against
    pub fn asset_root(&self) -> PathBuf {
        self.root.join(&self.config.orchestrator.asset_root)
    }

    /// Configured asset paths, for mapping file events to assets
    pub fn asset_paths(&self) -> HashMap<AssetPath, AssetId> {
        self.config
            .assets
            .iter()
            .map(|a| (a.path.clone(), a.id))
            .collect()
    }

    /// Display path of an asset, falling back to its id
    pub fn describe(&self, asset: &AssetId) -> String {
        self.config
            .assets
            .iter()
            .find(|a| a.id == *asset)
            .map(|a| a.path.to_string())
            .unwrap_or_else(|| asset.to_string())
    }
}
