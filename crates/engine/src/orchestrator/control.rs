// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The control task: lifecycle commands, probing and persistence.

use super::{Command, OrchestratorDeps, SlotInfo};
use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::event_bus::EventBus;
use crate::probe::{ProbePool, ProbeResult};
use crate::slot::{Slot, SlotOptions};
use kiln_adapters::{LaunchSpec, Launcher};
use kiln_core::{
    AssetDecl, AssetId, Clock, Event, FingerprintIndex, IdGen, JobOutcome, OrchestratorState,
    SlotId,
};
use kiln_storage::FingerprintStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};

/// Receivers the control loop waits on besides commands
pub(super) struct Inbox {
    wake: mpsc::Receiver<()>,
    probes: mpsc::UnboundedReceiver<ProbeResult>,
}

pub(super) struct Control<L, C, G> {
    pub(super) config: OrchestratorConfig,
    pub(super) launcher: L,
    pub(super) store: Arc<dyn FingerprintStore>,
    pub(super) clock: C,
    pub(super) ids: G,
    pub(super) bus: EventBus,
    pub(super) index: FingerprintIndex,
    pub(super) state: OrchestratorState,
    pub(super) state_tx: watch::Sender<OrchestratorState>,
    pub(super) slots: Vec<Slot<L>>,
    /// Assets with an open job, and the slot running it
    pub(super) in_flight: HashMap<AssetId, SlotId>,
    /// Attempt number for the next dispatch of a requeued asset
    pub(super) attempts: HashMap<AssetId, u32>,
    pub(super) probes: ProbePool,
    /// Outstanding probe per asset; older results are dropped
    pub(super) pending_probes: HashMap<AssetId, u64>,
    pub(super) next_probe_seq: u64,
    pub(super) wake_tx: mpsc::Sender<()>,
    pub(super) idle_waiters: Vec<oneshot::Sender<()>>,
    pub(super) reported_idle: bool,
    /// Index changes not yet handed to the store
    pub(super) unsaved: bool,
    pub(super) stop_deadline: Option<Instant>,
    /// Current stop kills rather than drains
    pub(super) forced: bool,
}

impl<L, C, G> Control<L, C, G>
where
    L: Launcher,
    C: Clock,
    G: IdGen,
{
    pub(super) fn new(
        config: OrchestratorConfig,
        deps: OrchestratorDeps<L, C, G>,
        index: FingerprintIndex,
        bus: EventBus,
        state_tx: watch::Sender<OrchestratorState>,
    ) -> (Self, Inbox) {
        // Capacity 1: a pending wake already covers any later one
        let (wake_tx, wake) = mpsc::channel(1);
        let (probe_tx, probes) = mpsc::unbounded_channel();
        let control = Self {
            probes: ProbePool::new(config.probe_concurrency, probe_tx),
            config,
            launcher: deps.launcher,
            store: deps.store,
            clock: deps.clock,
            ids: deps.ids,
            bus,
            index,
            state: OrchestratorState::Stopped,
            state_tx,
            slots: Vec::new(),
            in_flight: HashMap::new(),
            attempts: HashMap::new(),
            pending_probes: HashMap::new(),
            next_probe_seq: 0,
            wake_tx,
            idle_waiters: Vec::new(),
            reported_idle: false,
            unsaved: false,
            stop_deadline: None,
            forced: false,
        };
        (control, Inbox { wake, probes })
    }

    pub(super) async fn run(mut self, mut commands: mpsc::Receiver<Command>, mut inbox: Inbox) {
        let period = self.config.checkpoint_interval.max(Duration::from_millis(10));
        let mut checkpoint = tokio::time::interval_at(Instant::now() + period, period);
        checkpoint.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            self.pump().await;
            let deadline = self.stop_deadline;
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle(cmd).await,
                    None => break,
                },
                Some(()) = inbox.wake.recv() => {}
                Some(result) = inbox.probes.recv() => self.on_probe(result),
                _ = checkpoint.tick() => self.checkpoint().await,
                _ = sleep_until(deadline) => self.on_stop_timeout().await,
            }
        }

        tracing::debug!("all handles dropped, shutting down");
        if self.state == OrchestratorState::Running {
            self.set_state(OrchestratorState::Stopping);
        }
        if self.state == OrchestratorState::Stopping {
            self.force_stop().await;
            self.finish_stop().await;
        } else if self.unsaved {
            self.persist().await;
        }
    }

    async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Start(reply) => {
                let result = self.start().await;
                let _ = reply.send(result);
            }
            Command::Stop { force, reply } => {
                let result = self.stop(force).await;
                let _ = reply.send(result);
            }
            Command::MarkDirty { asset, reply } => {
                let _ = reply.send(self.mark_dirty(asset));
            }
            Command::Discover { decl, reply } => {
                let _ = reply.send(self.discover(decl));
            }
            Command::Remove { asset, reply } => {
                let _ = reply.send(self.remove(asset));
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.index.snapshot());
            }
            Command::Hull { asset, reply } => {
                let hull = self
                    .index
                    .compute_transitive_hull(&asset)
                    .map_err(OrchestratorError::from);
                let _ = reply.send(hull);
            }
            Command::Slots(reply) => {
                let _ = reply.send(self.slot_infos());
            }
            Command::WaitIdle(reply) => {
                if self.state == OrchestratorState::Running {
                    self.idle_waiters.push(reply);
                } else {
                    let _ = reply.send(());
                }
            }
        }
    }

    async fn start(&mut self) -> Result<(), OrchestratorError> {
        if self.state != OrchestratorState::Stopped {
            return Err(OrchestratorError::InvalidTransition {
                op: "start",
                state: self.state,
            });
        }
        tracing::info!(
            slots = self.config.slots,
            assets = self.index.len(),
            "starting build"
        );
        self.index.reset_cancelled();
        self.index.invalidate_probes();
        self.forced = false;
        self.reported_idle = false;

        for n in 0..self.config.slots {
            let worker = &self.config.worker;
            let mut spec = LaunchSpec::new(&worker.program, SlotId(n));
            spec.args = worker.args.clone();
            spec.operations = worker.operations.clone();
            spec.env = worker.env.clone();
            let options = SlotOptions {
                spec,
                retry_ceiling: self.config.retry_ceiling,
                asset_root: self.config.asset_root.clone(),
                output_dir: self.config.output_dir.clone(),
            };
            let mut slot = Slot::new(
                self.launcher.clone(),
                options,
                self.bus.clone(),
                self.wake_tx.clone(),
            );
            slot.start().await;
            self.slots.push(slot);
        }

        self.set_state(OrchestratorState::Running);
        let ids: Vec<AssetId> = self.index.ids().collect();
        for id in ids {
            self.probe(id);
        }
        Ok(())
    }

    async fn stop(&mut self, force: bool) -> Result<(), OrchestratorError> {
        match (self.state, force) {
            (OrchestratorState::Running, _) => {
                tracing::info!(force, in_flight = self.in_flight.len(), "stopping build");
                self.set_state(OrchestratorState::Stopping);
                self.pending_probes.clear();
                if force {
                    self.force_stop().await;
                } else if let Some(timeout) = self.config.stop_timeout {
                    self.stop_deadline = Some(Instant::now() + timeout);
                }
                Ok(())
            }
            (OrchestratorState::Stopping, true) => {
                tracing::info!("escalating to forced stop");
                self.force_stop().await;
                Ok(())
            }
            (state, _) => Err(OrchestratorError::InvalidTransition { op: "stop", state }),
        }
    }

    /// Kill every worker and cancel what they were running.
    pub(super) async fn force_stop(&mut self) {
        self.forced = true;
        self.stop_deadline = None;
        for i in 0..self.slots.len() {
            if let Some(job) = self.slots[i].kill().await {
                self.close_job(job, JobOutcome::Cancelled);
            }
        }
    }

    async fn on_stop_timeout(&mut self) {
        self.stop_deadline = None;
        if self.state == OrchestratorState::Stopping {
            tracing::warn!(
                in_flight = self.in_flight.len(),
                "graceful stop timed out, killing workers"
            );
            self.force_stop().await;
        }
    }

    /// Shut the slots down once none is busy, persist, and go `Stopped`.
    pub(super) async fn finish_stop(&mut self) {
        let forced = self.forced;
        for slot in &mut self.slots {
            slot.shutdown(forced).await;
        }
        self.slots.clear();
        self.in_flight.clear();
        self.attempts.clear();
        self.pending_probes.clear();
        self.stop_deadline = None;
        self.persist().await;
        self.set_state(OrchestratorState::Stopped);
        for waiter in self.idle_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }

    fn mark_dirty(&mut self, asset: AssetId) -> Result<(), OrchestratorError> {
        self.index.mark_dirty(&asset)?;
        tracing::debug!(asset = %asset, "marked dirty");
        self.unsaved = true;
        self.bus.publish(Event::AssetDirty { asset });
        if self.state == OrchestratorState::Running {
            self.probe(asset);
        }
        Ok(())
    }

    fn discover(&mut self, decl: AssetDecl) -> bool {
        let asset = decl.id;
        let path = decl.path.clone();
        let is_new = self.index.discover(decl);
        if is_new {
            tracing::debug!(asset = %asset, path = %path, "discovered");
            self.bus.publish(Event::AssetDiscovered { asset, path });
        }
        self.unsaved = true;
        let unprobed = self.index.get(&asset).is_some_and(|r| !r.probed);
        if unprobed && self.state == OrchestratorState::Running {
            self.probe(asset);
        }
        is_new
    }

    fn remove(&mut self, asset: AssetId) -> bool {
        if self.index.remove(&asset).is_none() {
            return false;
        }
        tracing::debug!(asset = %asset, "removed");
        self.pending_probes.remove(&asset);
        self.attempts.remove(&asset);
        self.unsaved = true;
        self.bus.publish(Event::AssetRemoved { asset });
        true
    }

    fn slot_infos(&self) -> Vec<SlotInfo> {
        self.slots
            .iter()
            .map(|slot| SlotInfo {
                id: slot.id(),
                state: slot.state(),
                job: slot.current_job().map(|j| j.id.clone()),
                consecutive_crashes: slot.consecutive_crashes(),
            })
            .collect()
    }

    /// Hash an asset's source in the background.
    pub(super) fn probe(&mut self, asset: AssetId) {
        let Ok(path) = self.index.source_path(&asset) else {
            return;
        };
        self.next_probe_seq += 1;
        let seq = self.next_probe_seq;
        self.pending_probes.insert(asset, seq);
        self.probes.probe(asset, seq, path);
    }

    fn on_probe(&mut self, result: ProbeResult) {
        if self.pending_probes.get(&result.asset) != Some(&result.seq) {
            return;
        }
        self.pending_probes.remove(&result.asset);
        if let Ok(true) = self.index.observe_source(&result.asset, result.hash) {
            tracing::debug!(asset = %result.asset, "source changed");
            self.unsaved = true;
        }
    }

    async fn checkpoint(&mut self) {
        if self.unsaved {
            self.persist().await;
        }
    }

    /// Hand a snapshot of the index to the store off the control task.
    pub(super) async fn persist(&mut self) {
        let snapshot = self.index.snapshot();
        let assets = snapshot.records.len();
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || store.save(&snapshot)).await {
            Ok(Ok(())) => {
                self.unsaved = false;
                tracing::debug!(assets, "fingerprint index saved");
            }
            Ok(Err(e)) => tracing::warn!(error = %e, "failed to save fingerprint index"),
            Err(e) => tracing::warn!(error = %e, "fingerprint save task failed"),
        }
    }

    pub(super) fn set_state(&mut self, state: OrchestratorState) {
        tracing::info!(from = %self.state, to = %state, "orchestrator state");
        self.state = state;
        self.state_tx.send_replace(state);
        self.bus.publish(Event::OrchestratorState { state });
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
