// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Folding bus events into per-asset build outcomes

use crate::project::Project;
use kiln_core::{AssetId, Event, FingerprintIndex, LogSeverity, TransformStatus};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Built,
    Failed,
    Cancelled,
    /// Stale, but never dispatched because a dependency is not up to date
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetOutcome {
    pub path: String,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Outcomes of one build, keyed by asset. A later event for the same
/// asset replaces the earlier outcome.
pub struct BuildReport {
    names: HashMap<AssetId, String>,
    outcomes: BTreeMap<AssetId, AssetOutcome>,
    total: usize,
}

impl BuildReport {
    pub fn new(project: &Project) -> Self {
        let names = project
            .config
            .assets
            .iter()
            .map(|a| (a.id, a.path.to_string()))
            .collect();
        Self::with_names(names)
    }

    pub fn with_names(names: HashMap<AssetId, String>) -> Self {
        let total = names.len();
        Self {
            names,
            outcomes: BTreeMap::new(),
            total,
        }
    }

    fn name(&self, asset: &AssetId) -> String {
        self.names
            .get(asset)
            .cloned()
            .unwrap_or_else(|| asset.to_string())
    }

    fn record(
        &mut self,
        asset: AssetId,
        outcome: Outcome,
        hash: Option<String>,
        reason: Option<String>,
    ) {
        let path = self.name(&asset);
        self.outcomes.insert(
            asset,
            AssetOutcome {
                path,
                outcome,
                output_hash: hash,
                reason,
            },
        );
    }

    /// Fold one event in. Returns a line worth showing the user.
    pub fn observe(&mut self, event: &Event) -> Option<String> {
        match event {
            Event::JobCompleted {
                asset,
                status,
                output_hash,
                reason,
                ..
            } => {
                let path = self.name(asset);
                match status {
                    TransformStatus::Success => {
                        let hash = output_hash.as_ref().map(|h| h.short(12));
                        self.record(*asset, Outcome::Built, hash.clone(), None);
                        Some(match hash {
                            Some(hash) => format!("built {path} ({hash})"),
                            None => format!("built {path}"),
                        })
                    }
                    TransformStatus::Failed => {
                        let reason = reason
                            .as_ref()
                            .map_or_else(|| "failed".to_string(), ToString::to_string);
                        self.record(*asset, Outcome::Failed, None, Some(reason.clone()));
                        Some(format!("failed {path}: {reason}"))
                    }
                    TransformStatus::Cancelled => {
                        self.record(*asset, Outcome::Cancelled, None, None);
                        Some(format!("cancelled {path}"))
                    }
                    TransformStatus::Unknown => None,
                }
            }
            Event::AssetFailed { asset, reason } => {
                // A failed job already reported this one
                if self
                    .outcomes
                    .get(asset)
                    .is_some_and(|o| o.outcome == Outcome::Failed)
                {
                    return None;
                }
                let reason = reason.to_string();
                self.record(*asset, Outcome::Failed, None, Some(reason.clone()));
                Some(format!("failed {}: {reason}", self.name(asset)))
            }
            Event::DependencyCycle { cycle } => {
                let names: Vec<String> = cycle.iter().map(|a| self.name(a)).collect();
                Some(format!("dependency cycle: {}", names.join(" -> ")))
            }
            Event::JobRequeued { asset, .. } => {
                Some(format!("retrying {} after a worker crash", self.name(asset)))
            }
            Event::SlotDisabled { slot, reason } => {
                Some(format!("worker slot {slot} disabled: {reason}"))
            }
            Event::JobLog {
                asset,
                severity: severity @ (LogSeverity::Warning | LogSeverity::Error),
                text,
                ..
            } => {
                let level = match severity {
                    LogSeverity::Error => "error",
                    _ => "warning",
                };
                Some(format!("{level} {}: {text}", self.name(asset)))
            }
            _ => None,
        }
    }

    /// Classify every asset this session said nothing about.
    ///
    /// Silence only means "up to date" when the index agrees. A stale asset
    /// that failed before and has unchanged inputs is still failed; any
    /// other stale asset is blocked. Returns the lines worth showing.
    pub fn settle(&mut self, index: &FingerprintIndex) -> Vec<String> {
        let mut silent: Vec<(String, AssetId)> = self
            .names
            .iter()
            .filter(|(id, _)| !self.outcomes.contains_key(id))
            .map(|(id, name)| (name.clone(), *id))
            .collect();
        silent.sort();

        let mut lines = Vec::new();
        for (path, asset) in silent {
            let Some(record) = index.get(&asset) else {
                continue;
            };
            if !index.is_stale(&asset).unwrap_or(true) {
                continue;
            }
            if record.last_status == TransformStatus::Failed {
                let reason = record
                    .last_failure
                    .as_ref()
                    .map_or_else(|| "failed".to_string(), ToString::to_string);
                lines.push(format!("failed {path}: {reason} (inputs unchanged)"));
                self.record(asset, Outcome::Failed, None, Some(reason));
                continue;
            }
            let waiting_on = record.dependencies.iter().find(|dep| {
                !index.get(dep).is_some_and(|r| {
                    r.built_source_hash.is_some() && !index.is_stale(dep).unwrap_or(true)
                })
            });
            let reason = match waiting_on {
                Some(dep) => format!("waiting on {}", self.name(dep)),
                None => "not built".to_string(),
            };
            lines.push(format!("blocked {path}: {reason}"));
            self.record(asset, Outcome::Blocked, None, Some(reason));
        }
        lines
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes
            .values()
            .filter(|o| o.outcome == outcome)
            .count()
    }

    pub fn up_to_date(&self) -> usize {
        self.total.saturating_sub(self.outcomes.len())
    }

    /// "3 built, 1 failed, 1 blocked, 2 up to date"
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("{} built", self.count(Outcome::Built))];
        let failed = self.count(Outcome::Failed);
        if failed > 0 {
            parts.push(format!("{failed} failed"));
        }
        let cancelled = self.count(Outcome::Cancelled);
        if cancelled > 0 {
            parts.push(format!("{cancelled} cancelled"));
        }
        let blocked = self.count(Outcome::Blocked);
        if blocked > 0 {
            parts.push(format!("{blocked} blocked"));
        }
        parts.push(format!("{} up to date", self.up_to_date()));
        parts.join(", ")
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut assets: Vec<&AssetOutcome> = self.outcomes.values().collect();
        assets.sort_by(|a, b| a.path.cmp(&b.path));
        serde_json::json!({
            "built": self.count(Outcome::Built),
            "failed": self.count(Outcome::Failed),
            "cancelled": self.count(Outcome::Cancelled),
            "blocked": self.count(Outcome::Blocked),
            "up_to_date": self.up_to_date(),
            "assets": assets,
        })
    }
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
