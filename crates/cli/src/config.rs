// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project configuration (`kiln.toml`)

use kiln_core::{AssetDecl, AssetId, AssetPath};
use kiln_engine::{CrashPolicy, OrchestratorConfig, WorkerCommand};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_FILE: &str = "kiln.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("orchestrator.slots must be at least 1")]
    NoSlots,
    #[error("asset {0} is declared more than once")]
    DuplicateId(AssetId),
    #[error("path {0} is declared by more than one asset")]
    DuplicatePath(AssetPath),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub orchestrator: OrchestratorSection,
    #[serde(default)]
    pub worker: WorkerSection,
    #[serde(default, rename = "asset")]
    pub assets: Vec<AssetEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestratorSection {
    /// Asset sources, relative to the project root
    pub asset_root: PathBuf,
    /// Build products, relative to the project root
    pub output_dir: Option<PathBuf>,
    pub slots: u32,
    pub retry_ceiling: u32,
    pub crash_policy: CrashPolicy,
    pub stop_timeout_ms: Option<u64>,
    pub probe_concurrency: usize,
    pub checkpoint_interval_ms: u64,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("."),
            output_dir: Some(PathBuf::from("build")),
            slots: 2,
            retry_ceiling: 3,
            crash_policy: CrashPolicy::default(),
            stop_timeout_ms: None,
            probe_concurrency: 4,
            checkpoint_interval_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerSection {
    /// Worker executable; `kiln-worker` when unset
    pub program: Option<PathBuf>,
    pub args: Vec<String>,
    /// Operations every worker must provide
    pub operations: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetEntry {
    pub id: AssetId,
    pub path: AssetPath,
    pub operation: String,
    #[serde(default)]
    pub deps: Vec<AssetId>,
    #[serde(default)]
    pub config: serde_json::Value,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.orchestrator.slots == 0 {
            return Err(ConfigError::NoSlots);
        }
        let mut ids = HashSet::new();
        let mut paths = HashSet::new();
        for entry in &self.assets {
            if !ids.insert(entry.id) {
                return Err(ConfigError::DuplicateId(entry.id));
            }
            if !paths.insert(&entry.path) {
                return Err(ConfigError::DuplicatePath(entry.path.clone()));
            }
        }
        Ok(())
    }

    /// Asset declarations in file order.
    ///
    /// Dependencies on undeclared ids are kept; the orchestrator reports
    /// them as missing when it schedules.
    pub fn decls(&self) -> Vec<AssetDecl> {
        self.assets
            .iter()
            .map(|entry| {
                AssetDecl::new(entry.id, entry.path.clone(), entry.operation.clone())
                    .depends_on(entry.deps.iter().copied())
                    .with_config(entry.config.clone())
            })
            .collect()
    }

    /// Look an asset up by id or by path
    pub fn find_asset(&self, key: &str) -> Option<&AssetEntry> {
        self.assets
            .iter()
            .find(|a| a.path.as_str() == key || a.id.to_string() == key)
    }

    /// Settings for the orchestrator. Relative paths resolve against
    /// `project_root`; a bare program name is left for PATH lookup.
    pub fn orchestrator_config(
        &self,
        project_root: &Path,
        default_worker: PathBuf,
    ) -> OrchestratorConfig {
        let section = &self.orchestrator;
        let program = match &self.worker.program {
            Some(p) if p.is_relative() && p.components().count() > 1 => project_root.join(p),
            Some(p) => p.clone(),
            None => default_worker,
        };
        let mut worker = WorkerCommand::new(program);
        worker.args = self.worker.args.clone();
        worker.operations = self.worker.operations.clone();

        let mut config = OrchestratorConfig::new(project_root.join(&section.asset_root), worker);
        config.output_dir = section.output_dir.as_ref().map(|dir| project_root.join(dir));
        config.slots = section.slots;
        config.retry_ceiling = section.retry_ceiling;
        config.crash_policy = section.crash_policy;
        config.stop_timeout = section.stop_timeout_ms.map(Duration::from_millis);
        config.probe_concurrency = section.probe_concurrency.max(1);
        config.checkpoint_interval = Duration::from_millis(section.checkpoint_interval_ms.max(1));
        config
    }
}

/// Find the project root by walking up from `start` to the first
/// directory holding a `kiln.toml`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(CONFIG_FILE).is_file())
        .map(Path::to_path_buf)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
