// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content fingerprint index.
//!
//! Maps each asset to the hashes its last successful build was made from,
//! answers staleness queries, computes transitive dependency hulls and
//! commits the outcome of finished jobs. Only the orchestrator mutates it;
//! external readers get an [`IndexSnapshot`].

use crate::asset::{AssetDecl, AssetId, AssetPath};
use crate::hash::ContentHash;
use crate::job::{FailureReason, JobInputs, JobOutcome, TransformStatus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("unknown asset: {0}")]
    UnknownAsset(AssetId),
    #[error("asset {asset} depends on unknown asset {dependency}")]
    UnknownDependency { asset: AssetId, dependency: AssetId },
    #[error("dependency cycle: {}", format_cycle(.0))]
    DependencyCycle(Vec<AssetId>),
}

/// Render a cycle path as `a -> b -> a`.
pub fn format_cycle(cycle: &[AssetId]) -> String {
    cycle
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Per-asset fingerprint state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    pub id: AssetId,
    pub path: AssetPath,
    pub operation: String,
    #[serde(default)]
    pub config: serde_json::Value,
    /// Declared direct dependencies
    #[serde(default)]
    pub dependencies: Vec<AssetId>,
    /// Last observed hash of the source bytes; `None` if unreadable
    #[serde(default)]
    pub source_hash: Option<ContentHash>,
    /// Source hash the last successful transform was made from
    #[serde(default)]
    pub built_source_hash: Option<ContentHash>,
    /// Dependency hash the last successful transform was made from
    #[serde(default)]
    pub built_dependency_hash: Option<ContentHash>,
    /// All direct and indirect dependencies, dependencies first
    #[serde(default)]
    pub transitive_hull: Vec<AssetId>,
    #[serde(default)]
    pub last_output_hash: Option<ContentHash>,
    #[serde(default)]
    pub last_status: TransformStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<FailureReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt_ms: Option<u64>,
    /// Inputs of the last unsuccessful attempt. The asset is not
    /// re-dispatched while its current inputs are the same.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempted_inputs: Option<JobInputs>,
    /// Rebuild regardless of hashes
    #[serde(default)]
    pub force_dirty: bool,
    /// Whether `source_hash` was observed during this session
    #[serde(skip)]
    pub probed: bool,
}

impl FingerprintRecord {
    fn from_decl(decl: AssetDecl) -> Self {
        Self {
            id: decl.id,
            path: decl.path,
            operation: decl.operation,
            config: decl.config,
            dependencies: decl.dependencies,
            source_hash: None,
            built_source_hash: None,
            built_dependency_hash: None,
            transitive_hull: Vec::new(),
            last_output_hash: None,
            last_status: TransformStatus::Unknown,
            last_failure: None,
            last_attempt_ms: None,
            attempted_inputs: None,
            force_dirty: false,
            probed: false,
        }
    }
}

/// Read-only copy of the index for observers and persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub records: Vec<FingerprintRecord>,
}

impl IndexSnapshot {
    pub fn get(&self, id: &AssetId) -> Option<&FingerprintRecord> {
        self.records.iter().find(|r| r.id == *id)
    }

    pub fn find_path(&self, path: &str) -> Option<&FingerprintRecord> {
        self.records.iter().find(|r| r.path.as_str() == path)
    }
}

/// Result of scanning the index for dispatchable work.
#[derive(Debug, Default)]
pub struct ReadyScan {
    /// Assets that may be dispatched now, dependencies first
    pub ready: Vec<AssetId>,
    /// Assets whose dependency graph is broken
    pub problems: Vec<(AssetId, IndexError)>,
}

pub struct FingerprintIndex {
    root: PathBuf,
    records: HashMap<AssetId, FingerprintRecord>,
    hulls: HashMap<AssetId, Vec<AssetId>>,
}

impl FingerprintIndex {
    /// Empty index for assets stored under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            records: HashMap::new(),
            hulls: HashMap::new(),
        }
    }

    /// Restore an index from a persisted snapshot. Every record starts
    /// unprobed.
    pub fn from_snapshot(root: impl Into<PathBuf>, snapshot: IndexSnapshot) -> Self {
        let mut index = Self::new(root);
        for mut record in snapshot.records {
            record.probed = false;
            index.records.insert(record.id, record);
        }
        index
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &AssetId) -> Option<&FingerprintRecord> {
        self.records.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = AssetId> + '_ {
        self.records.keys().copied()
    }

    pub fn find_path(&self, path: &AssetPath) -> Option<AssetId> {
        self.records
            .values()
            .find(|r| r.path == *path)
            .map(|r| r.id)
    }

    /// Location of an asset's source on disk.
    pub fn source_path(&self, id: &AssetId) -> Result<PathBuf, IndexError> {
        Ok(self.record(id)?.path.resolve(&self.root))
    }

    /// Register a newly discovered asset, or refresh an existing one.
    ///
    /// Returns `true` if the asset was not known before. A changed
    /// declaration invalidates the asset's previous attempt and probe.
    pub fn discover(&mut self, decl: AssetDecl) -> bool {
        match self.records.get_mut(&decl.id) {
            Some(record) => {
                let changed = record.path != decl.path
                    || record.operation != decl.operation
                    || record.config != decl.config
                    || record.dependencies != decl.dependencies;
                if changed {
                    record.path = decl.path;
                    record.operation = decl.operation;
                    record.config = decl.config;
                    record.dependencies = decl.dependencies;
                    record.attempted_inputs = None;
                    record.probed = false;
                    self.invalidate_graph();
                }
                false
            }
            None => {
                self.records
                    .insert(decl.id, FingerprintRecord::from_decl(decl));
                self.invalidate_graph();
                true
            }
        }
    }

    /// Forget an asset whose source file disappeared.
    pub fn remove(&mut self, id: &AssetId) -> Option<FingerprintRecord> {
        let removed = self.records.remove(id);
        if removed.is_some() {
            self.invalidate_graph();
        }
        removed
    }

    /// Replace an asset's direct dependency list.
    pub fn set_dependencies(
        &mut self,
        id: &AssetId,
        dependencies: Vec<AssetId>,
    ) -> Result<(), IndexError> {
        let record = self.record_mut(id)?;
        record.dependencies = dependencies;
        self.invalidate_graph();
        Ok(())
    }

    /// Drop memoized hulls and lift cycle verdicts; a graph edit is what
    /// breaks a cycle.
    fn invalidate_graph(&mut self) {
        self.hulls.clear();
        for record in self.records.values_mut() {
            if matches!(
                record.last_failure,
                Some(FailureReason::DependencyCycle(_)) | Some(FailureReason::MissingDependency(_))
            ) {
                record.attempted_inputs = None;
            }
        }
    }

    /// Force an asset to rebuild. Its source must be probed again before
    /// it is dispatched.
    pub fn mark_dirty(&mut self, id: &AssetId) -> Result<(), IndexError> {
        let record = self.record_mut(id)?;
        record.force_dirty = true;
        record.probed = false;
        record.attempted_inputs = None;
        Ok(())
    }

    /// Clear the previous-attempt guard of cancelled assets so a new
    /// session retries them.
    pub fn reset_cancelled(&mut self) {
        for record in self.records.values_mut() {
            if record.last_status == TransformStatus::Cancelled {
                record.attempted_inputs = None;
            }
        }
    }

    /// Record a source hash computed off the scheduling loop.
    ///
    /// Returns `true` if the observed hash changed.
    pub fn observe_source(
        &mut self,
        id: &AssetId,
        source_hash: Option<ContentHash>,
    ) -> Result<bool, IndexError> {
        let record = self.record_mut(id)?;
        let changed = record.source_hash != source_hash;
        record.source_hash = source_hash;
        record.probed = true;
        Ok(changed)
    }

    /// Forget every observed source hash so nothing is dispatched until
    /// it has been probed again.
    pub fn invalidate_probes(&mut self) {
        for record in self.records.values_mut() {
            record.probed = false;
        }
    }

    /// Assets that have not been probed this session.
    pub fn unprobed(&self) -> Vec<AssetId> {
        self.records
            .values()
            .filter(|r| !r.probed)
            .map(|r| r.id)
            .collect()
    }

    /// Whether `id` is stale, re-hashing its source from disk.
    ///
    /// An unreadable source counts as stale so it gets retried.
    pub fn is_stale(&self, id: &AssetId) -> Result<bool, IndexError> {
        let record = self.record(id)?;
        let source = ContentHash::of_file(&record.path.resolve(&self.root)).ok();
        Ok(self.stale_against(record, source))
    }

    /// Whether `id` is stale according to the last observed source hash.
    pub fn is_stale_observed(&self, id: &AssetId) -> Result<bool, IndexError> {
        let record = self.record(id)?;
        Ok(self.stale_against(record, record.source_hash))
    }

    fn stale_against(&self, record: &FingerprintRecord, source: Option<ContentHash>) -> bool {
        if record.force_dirty {
            return true;
        }
        let Some(source) = source else {
            return true;
        };
        record.built_source_hash != Some(source)
            || record.built_dependency_hash != Some(self.dependency_hash_of(record))
    }

    /// Order-independent fold of the direct dependencies' output hashes.
    pub fn dependency_hash(&self, id: &AssetId) -> Result<ContentHash, IndexError> {
        Ok(self.dependency_hash_of(self.record(id)?))
    }

    fn dependency_hash_of(&self, record: &FingerprintRecord) -> ContentHash {
        let unique: BTreeSet<AssetId> = record.dependencies.iter().copied().collect();
        ContentHash::combine_unordered(unique.into_iter().map(|dep| {
            let output = self
                .records
                .get(&dep)
                .and_then(|r| r.last_output_hash)
                .map(|h| h.as_bytes().to_vec())
                .unwrap_or_default();
            ContentHash::of_parts([dep.as_bytes().as_slice(), output.as_slice()])
        }))
    }

    /// Inputs a job for `id` would be built from right now.
    pub fn current_inputs(&self, id: &AssetId) -> Result<JobInputs, IndexError> {
        let record = self.record(id)?;
        Ok(JobInputs {
            source_hash: record.source_hash,
            dependency_hash: self.dependency_hash_of(record),
        })
    }

    /// Capture the inputs for a job about to be dispatched and consume the
    /// force-dirty flag.
    pub fn begin_dispatch(&mut self, id: &AssetId) -> Result<JobInputs, IndexError> {
        let inputs = self.current_inputs(id)?;
        self.record_mut(id)?.force_dirty = false;
        Ok(inputs)
    }

    /// All direct and indirect dependencies of `id`, dependencies first.
    ///
    /// Memoized until the graph changes. A cycle reachable from `id` is
    /// reported with its path rather than traversed.
    pub fn compute_transitive_hull(&mut self, id: &AssetId) -> Result<Vec<AssetId>, IndexError> {
        if !self.records.contains_key(id) {
            return Err(IndexError::UnknownAsset(*id));
        }
        let mut path = Vec::new();
        self.visit_hull(*id, &mut path)
    }

    fn visit_hull(
        &mut self,
        id: AssetId,
        path: &mut Vec<AssetId>,
    ) -> Result<Vec<AssetId>, IndexError> {
        if let Some(hull) = self.hulls.get(&id) {
            return Ok(hull.clone());
        }
        if let Some(pos) = path.iter().position(|p| *p == id) {
            let mut cycle = path[pos..].to_vec();
            cycle.push(id);
            return Err(IndexError::DependencyCycle(cycle));
        }
        let dependencies = match self.records.get(&id) {
            Some(record) => record.dependencies.clone(),
            None => {
                return Err(match path.last() {
                    Some(parent) => IndexError::UnknownDependency {
                        asset: *parent,
                        dependency: id,
                    },
                    None => IndexError::UnknownAsset(id),
                })
            }
        };

        path.push(id);
        let mut hull = Vec::new();
        let mut seen = HashSet::new();
        for dep in dependencies {
            if seen.contains(&dep) {
                continue;
            }
            let indirect = self.visit_hull(dep, path);
            let indirect = match indirect {
                Ok(indirect) => indirect,
                Err(e) => {
                    path.pop();
                    return Err(e);
                }
            };
            for member in indirect.into_iter().chain([dep]) {
                if seen.insert(member) {
                    hull.push(member);
                }
            }
        }
        path.pop();

        self.hulls.insert(id, hull.clone());
        if let Some(record) = self.records.get_mut(&id) {
            record.transitive_hull = hull.clone();
        }
        Ok(hull)
    }

    /// Find stale assets whose entire hull is built, probed and idle.
    ///
    /// Assets already in flight, not yet probed, or whose last failed
    /// attempt used the current inputs are skipped. Results are ordered by
    /// hull size then path so dependencies come first.
    pub fn ready_candidates(&mut self, in_flight: &HashSet<AssetId>) -> ReadyScan {
        let mut ids: Vec<(AssetPath, AssetId)> = self
            .records
            .values()
            .map(|r| (r.path.clone(), r.id))
            .collect();
        ids.sort();

        let mut scan = ReadyScan::default();
        let mut ready = Vec::new();
        for (path, id) in ids {
            if in_flight.contains(&id) || !self.is_dispatchable(&id) {
                continue;
            }
            let hull = match self.compute_transitive_hull(&id) {
                Ok(hull) => hull,
                Err(e) => {
                    scan.problems.push((id, e));
                    continue;
                }
            };
            let settled = hull.iter().all(|dep| {
                !in_flight.contains(dep)
                    && self.records.get(dep).is_some_and(|r| {
                        r.probed && r.built_source_hash.is_some() && !self.stale_against(r, r.source_hash)
                    })
            });
            if settled {
                ready.push((hull.len(), path, id));
            }
        }
        ready.sort();
        scan.ready = ready.into_iter().map(|(_, _, id)| id).collect();
        scan
    }

    fn is_dispatchable(&self, id: &AssetId) -> bool {
        let Some(record) = self.records.get(id) else {
            return false;
        };
        if !record.probed || !self.stale_against(record, record.source_hash) {
            return false;
        }
        if record.force_dirty {
            return true;
        }
        let inputs = JobInputs {
            source_hash: record.source_hash,
            dependency_hash: self.dependency_hash_of(record),
        };
        record.attempted_inputs != Some(inputs)
    }

    /// Commit the outcome of a finished job.
    ///
    /// Called by the orchestrator only after the job has been closed, so
    /// at most one commit per asset is ever in progress.
    pub fn commit_result(
        &mut self,
        id: &AssetId,
        inputs: JobInputs,
        outcome: &JobOutcome,
        at_ms: u64,
    ) -> Result<(), IndexError> {
        let record = self.record_mut(id)?;
        tracing::debug!(asset = %id, status = %outcome.status(), "committing result");
        record.last_status = outcome.status();
        record.last_attempt_ms = Some(at_ms);
        match outcome {
            JobOutcome::Succeeded { output_hash, .. } => {
                record.built_source_hash = inputs.source_hash;
                record.built_dependency_hash = Some(inputs.dependency_hash);
                record.last_output_hash = Some(*output_hash);
                record.last_failure = None;
                record.attempted_inputs = None;
            }
            JobOutcome::Failed { reason } => {
                record.last_failure = Some(reason.clone());
                record.attempted_inputs = Some(inputs);
            }
            JobOutcome::Cancelled => {
                record.last_failure = None;
                record.attempted_inputs = Some(inputs);
            }
        }
        Ok(())
    }

    /// Fail an asset that cannot be dispatched at all.
    pub fn mark_failed(
        &mut self,
        id: &AssetId,
        reason: FailureReason,
        at_ms: u64,
    ) -> Result<(), IndexError> {
        let inputs = self.current_inputs(id)?;
        self.commit_result(id, inputs, &JobOutcome::failed(reason), at_ms)
    }

    /// Fail every member of a dependency cycle until the graph is edited.
    ///
    /// Returns the distinct members that were marked.
    pub fn mark_cycle(&mut self, cycle: &[AssetId], at_ms: u64) -> Vec<AssetId> {
        let text = format_cycle(cycle);
        tracing::warn!(cycle = %text, "dependency cycle");
        let mut marked = Vec::new();
        for id in cycle {
            if marked.contains(id) {
                continue;
            }
            if self
                .mark_failed(id, FailureReason::DependencyCycle(text.clone()), at_ms)
                .is_ok()
            {
                marked.push(*id);
            }
        }
        marked
    }

    pub fn snapshot(&self) -> IndexSnapshot {
        let mut records: Vec<FingerprintRecord> = self.records.values().cloned().collect();
        records.sort_by(|a, b| a.path.cmp(&b.path).then(a.id.cmp(&b.id)));
        IndexSnapshot { records }
    }

    fn record(&self, id: &AssetId) -> Result<&FingerprintRecord, IndexError> {
        self.records.get(id).ok_or(IndexError::UnknownAsset(*id))
    }

    fn record_mut(&mut self, id: &AssetId) -> Result<&mut FingerprintRecord, IndexError> {
        self.records.get_mut(id).ok_or(IndexError::UnknownAsset(*id))
    }
}

#[cfg(test)]
#[path = "fingerprint_tests.rs"]
mod tests;
