// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduling: slot events in, jobs out.

use super::control::Control;
use crate::config::CrashPolicy;
use crate::slot::{Slot, SlotEvent};
use kiln_adapters::Launcher;
use kiln_core::{
    format_cycle, AssetId, Clock, Event, FailureReason, IdGen, IndexError, Job, JobId, JobOutcome,
    OrchestratorState, SlotState,
};
use std::collections::HashSet;

impl<L, C, G> Control<L, C, G>
where
    L: Launcher,
    C: Clock,
    G: IdGen,
{
    /// Drain every slot, then schedule, until neither makes progress.
    pub(super) async fn pump(&mut self) {
        loop {
            let mut progressed = false;
            for i in 0..self.slots.len() {
                while let Some(event) = self.slots[i].poll().await {
                    progressed = true;
                    self.on_slot_event(event);
                }
            }
            if self.state == OrchestratorState::Running && self.schedule().await {
                progressed = true;
            }
            if self.state == OrchestratorState::Stopping && !self.slots.iter().any(Slot::is_busy)
            {
                self.finish_stop().await;
            }
            if !progressed {
                break;
            }
        }
        self.check_idle();
    }

    fn on_slot_event(&mut self, event: SlotEvent) {
        match event {
            SlotEvent::Progress {
                job,
                asset,
                fraction,
                label,
            } => self.bus.publish(Event::JobProgress {
                job,
                asset,
                fraction,
                label,
            }),
            SlotEvent::Log { job, asset, entry } => {
                tracing::debug!(job = %job, severity = ?entry.severity, "worker: {}", entry.text);
                self.bus.publish(Event::JobLog {
                    job,
                    asset,
                    severity: entry.severity,
                    text: entry.text,
                });
            }
            SlotEvent::Completed { job, outcome } => self.close_job(job, outcome),
            SlotEvent::Crashed {
                job: Some(job),
                disabled,
            } => self.on_crashed_job(job, disabled),
            SlotEvent::Crashed { job: None, .. } => {}
        }
    }

    fn on_crashed_job(&mut self, job: Job, disabled: bool) {
        if disabled {
            return self.close_job(job, JobOutcome::failed(FailureReason::WorkerUnavailable));
        }
        match self.config.crash_policy {
            CrashPolicy::Cancel => self.close_job(job, JobOutcome::Cancelled),
            CrashPolicy::Requeue if job.attempt > self.config.retry_ceiling => {
                tracing::warn!(
                    job = %job.id,
                    path = %job.path,
                    attempts = job.attempt,
                    "asset keeps crashing workers, giving up"
                );
                self.close_job(job, JobOutcome::failed(FailureReason::WorkerUnavailable));
            }
            CrashPolicy::Requeue => {
                let asset = job.asset;
                self.in_flight.remove(&asset);
                self.attempts.insert(asset, job.attempt + 1);
                tracing::info!(job = %job.id, path = %job.path, attempt = job.attempt, "requeued after worker crash");
                self.bus.publish(Event::JobRequeued { job: job.id, asset });
                // Dispatch cleared the dirty flag; the asset must build again
                if self.index.mark_dirty(&asset).is_ok()
                    && self.state == OrchestratorState::Running
                {
                    self.probe(asset);
                }
            }
        }
    }

    /// Close a job and commit its outcome.
    pub(super) fn close_job(&mut self, job: Job, outcome: JobOutcome) {
        self.in_flight.remove(&job.asset);
        self.attempts.remove(&job.asset);
        let at = self.clock.epoch_ms();
        match self
            .index
            .commit_result(&job.asset, job.inputs, &outcome, at)
        {
            Ok(()) => self.unsaved = true,
            Err(e) => tracing::debug!(job = %job.id, error = %e, "result for removed asset dropped"),
        }

        let (output_hash, reason) = match &outcome {
            JobOutcome::Succeeded { output_hash, .. } => (Some(*output_hash), None),
            JobOutcome::Failed { reason } => (None, Some(reason.clone())),
            JobOutcome::Cancelled => (None, None),
        };
        match &reason {
            Some(reason) => {
                tracing::warn!(job = %job.id, path = %job.path, %reason, "job failed")
            }
            None => {
                tracing::info!(job = %job.id, path = %job.path, status = %outcome.status(), "job completed")
            }
        }
        self.bus.publish(Event::JobCompleted {
            job: job.id,
            asset: job.asset,
            status: outcome.status(),
            output_hash,
            reason: reason.clone(),
        });
        if let Some(reason @ FailureReason::WorkerUnavailable) = reason {
            self.bus.publish(Event::AssetFailed {
                asset: job.asset,
                reason,
            });
        }
    }

    /// Assign ready assets to idle slots. Returns `true` if anything
    /// changed.
    async fn schedule(&mut self) -> bool {
        let in_flight: HashSet<AssetId> = self.in_flight.keys().copied().collect();
        let scan = self.index.ready_candidates(&in_flight);
        let mut changed = self.fail_unschedulable(scan.problems);
        if scan.ready.is_empty() {
            return changed;
        }

        if !self.slots.iter().any(|s| s.state().is_usable()) {
            tracing::warn!(ready = scan.ready.len(), "no usable worker slots");
            let at = self.clock.epoch_ms();
            for asset in scan.ready {
                self.fail_asset(asset, FailureReason::WorkerUnavailable, at);
            }
            return true;
        }

        for asset in scan.ready {
            let Some(i) = self
                .slots
                .iter()
                .position(|s| s.state() == SlotState::Idle)
            else {
                break;
            };
            if self.dispatch(i, asset).await {
                changed = true;
            }
        }
        changed
    }

    async fn dispatch(&mut self, i: usize, asset: AssetId) -> bool {
        let inputs = match self.index.begin_dispatch(&asset) {
            Ok(inputs) => inputs,
            Err(e) => {
                tracing::debug!(asset = %asset, error = %e, "not dispatching");
                return false;
            }
        };
        let Some(record) = self.index.get(&asset) else {
            return false;
        };
        let job = Job {
            id: JobId::new(self.ids.next()),
            asset,
            path: record.path.clone(),
            operation: record.operation.clone(),
            config: record.config.clone(),
            inputs,
            enqueued_at_ms: self.clock.epoch_ms(),
            attempt: self.attempts.get(&asset).copied().unwrap_or(1),
        };

        let slot = self.slots[i].id();
        tracing::info!(job = %job.id, path = %job.path, slot = %slot, attempt = job.attempt, "dispatching");
        self.bus.publish(Event::JobDispatched {
            job: job.id.clone(),
            asset,
            path: job.path.clone(),
            slot,
            attempt: job.attempt,
        });
        self.in_flight.insert(asset, slot);
        match self.slots[i].assign_job(job).await {
            Ok(()) => true,
            Err(e) => {
                self.in_flight.remove(&asset);
                tracing::warn!(asset = %asset, slot = %slot, error = %e, "assign failed");
                false
            }
        }
    }

    /// Fail assets whose dependency graph is broken. Returns `true` if any
    /// asset was failed.
    fn fail_unschedulable(&mut self, problems: Vec<(AssetId, IndexError)>) -> bool {
        let at = self.clock.epoch_ms();
        let mut failed: HashSet<AssetId> = HashSet::new();
        for (asset, err) in problems {
            match err {
                IndexError::DependencyCycle(cycle) => {
                    let text = format_cycle(&cycle);
                    if !cycle.iter().all(|m| failed.contains(m)) {
                        let marked = self.index.mark_cycle(&cycle, at);
                        self.bus.publish(Event::DependencyCycle {
                            cycle: cycle.clone(),
                        });
                        for member in marked {
                            failed.insert(member);
                            self.bus.publish(Event::AssetFailed {
                                asset: member,
                                reason: FailureReason::DependencyCycle(text.clone()),
                            });
                        }
                    }
                    // Depends on a cycle without being part of it
                    if failed.insert(asset) {
                        self.fail_asset(asset, FailureReason::DependencyCycle(text), at);
                    }
                }
                IndexError::UnknownDependency { dependency, .. } => {
                    if failed.insert(asset) {
                        self.fail_asset(
                            asset,
                            FailureReason::MissingDependency(dependency.to_string()),
                            at,
                        );
                    }
                }
                IndexError::UnknownAsset(_) => {}
            }
        }
        self.unsaved |= !failed.is_empty();
        !failed.is_empty()
    }

    fn fail_asset(&mut self, asset: AssetId, reason: FailureReason, at: u64) {
        if self.index.mark_failed(&asset, reason.clone(), at).is_ok() {
            tracing::warn!(asset = %asset, %reason, "asset failed");
            self.unsaved = true;
            self.bus.publish(Event::AssetFailed { asset, reason });
        }
    }

    /// Resolve idle waiters and announce idleness once per quiet period.
    fn check_idle(&mut self) {
        let idle = self.state == OrchestratorState::Running
            && self.in_flight.is_empty()
            && self.pending_probes.is_empty();
        if !idle {
            self.reported_idle = false;
            return;
        }
        for waiter in self.idle_waiters.drain(..) {
            let _ = waiter.send(());
        }
        if !self.reported_idle {
            self.reported_idle = true;
            tracing::info!(assets = self.index.len(), "build idle");
            self.bus.publish(Event::OrchestratorIdle);
        }
    }
}
