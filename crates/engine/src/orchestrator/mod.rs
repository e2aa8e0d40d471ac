// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build orchestrator
//!
//! [`Orchestrator::spawn`] starts one control task that owns the index,
//! the slots and every scheduling decision. The returned handle is cheap
//! to clone and only talks to the control task through messages.

mod control;
mod dispatch;

use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::event_bus::{EventBus, Subscription, SubscriptionId};
use control::Control;
use kiln_adapters::Launcher;
use kiln_core::{
    AssetDecl, AssetId, Clock, FingerprintIndex, IdGen, IndexSnapshot, JobId, OrchestratorState,
    SlotId, SlotState,
};
use kiln_storage::FingerprintStore;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

/// Collaborators the orchestrator is built from
pub struct OrchestratorDeps<L, C, G> {
    pub launcher: L,
    pub store: Arc<dyn FingerprintStore>,
    pub clock: C,
    pub ids: G,
}

/// Point-in-time view of one slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotInfo {
    pub id: SlotId,
    pub state: SlotState,
    pub job: Option<JobId>,
    pub consecutive_crashes: u32,
}

type Reply<T> = oneshot::Sender<T>;

pub(crate) enum Command {
    Start(Reply<Result<(), OrchestratorError>>),
    Stop {
        force: bool,
        reply: Reply<Result<(), OrchestratorError>>,
    },
    MarkDirty {
        asset: AssetId,
        reply: Reply<Result<(), OrchestratorError>>,
    },
    Discover {
        decl: AssetDecl,
        reply: Reply<bool>,
    },
    Remove {
        asset: AssetId,
        reply: Reply<bool>,
    },
    Snapshot(Reply<IndexSnapshot>),
    Hull {
        asset: AssetId,
        reply: Reply<Result<Vec<AssetId>, OrchestratorError>>,
    },
    Slots(Reply<Vec<SlotInfo>>),
    WaitIdle(Reply<()>),
}

/// Handle on a running control task
#[derive(Clone)]
pub struct Orchestrator {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<OrchestratorState>,
    bus: EventBus,
}

impl Orchestrator {
    /// Load the persisted index and start the control task.
    ///
    /// The orchestrator starts `Stopped`; no worker is spawned until
    /// [`start`](Self::start). The control task exits once every handle
    /// is dropped, killing any workers still running.
    pub fn spawn<L, C, G>(
        config: OrchestratorConfig,
        deps: OrchestratorDeps<L, C, G>,
    ) -> Result<Self, OrchestratorError>
    where
        L: Launcher,
        C: Clock,
        G: IdGen,
    {
        let index = match deps.store.load()? {
            Some(snapshot) => {
                tracing::info!(assets = snapshot.records.len(), "loaded fingerprint index");
                FingerprintIndex::from_snapshot(&config.asset_root, snapshot)
            }
            None => FingerprintIndex::new(&config.asset_root),
        };

        let bus = EventBus::new();
        let (commands, command_rx) = mpsc::channel(64);
        let (state_tx, state) = watch::channel(OrchestratorState::Stopped);
        let (control, inbox) = Control::new(config, deps, index, bus.clone(), state_tx);
        tokio::spawn(control.run(command_rx, inbox));

        Ok(Self {
            commands,
            state,
            bus,
        })
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, OrchestratorError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| OrchestratorError::Closed)?;
        rx.await.map_err(|_| OrchestratorError::Closed)
    }

    /// Spawn the worker slots and begin scheduling. Legal only while
    /// `Stopped`.
    pub async fn start(&self) -> Result<(), OrchestratorError> {
        self.request(Command::Start).await?
    }

    /// Begin stopping. Legal while `Running`; a forced stop is also
    /// accepted while `Stopping` to cut a graceful stop short.
    ///
    /// Returns once the transition is accepted; use
    /// [`wait_for_state`](Self::wait_for_state) to wait for `Stopped`.
    pub async fn stop(&self, force: bool) -> Result<(), OrchestratorError> {
        self.request(|reply| Command::Stop { force, reply }).await?
    }

    pub fn state(&self) -> OrchestratorState {
        *self.state.borrow()
    }

    pub async fn wait_for_state(&self, target: OrchestratorState) -> Result<(), OrchestratorError> {
        let mut rx = self.state.clone();
        rx.wait_for(|s| *s == target)
            .await
            .map(|_| ())
            .map_err(|_| OrchestratorError::Closed)
    }

    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Force `asset` to rebuild; its source is hashed again first.
    pub async fn mark_dirty(&self, asset: AssetId) -> Result<(), OrchestratorError> {
        self.request(|reply| Command::MarkDirty { asset, reply })
            .await?
    }

    /// Register or refresh an asset. Returns `true` if it is new.
    pub async fn discover(&self, decl: AssetDecl) -> Result<bool, OrchestratorError> {
        self.request(|reply| Command::Discover { decl, reply }).await
    }

    /// Forget an asset. Returns `false` if it was not known.
    pub async fn remove(&self, asset: AssetId) -> Result<bool, OrchestratorError> {
        self.request(|reply| Command::Remove { asset, reply }).await
    }

    pub async fn snapshot(&self) -> Result<IndexSnapshot, OrchestratorError> {
        self.request(Command::Snapshot).await
    }

    /// Every direct and indirect dependency of `asset`, dependencies first.
    pub async fn hull(&self, asset: AssetId) -> Result<Vec<AssetId>, OrchestratorError> {
        self.request(|reply| Command::Hull { asset, reply }).await?
    }

    pub async fn slots(&self) -> Result<Vec<SlotInfo>, OrchestratorError> {
        self.request(Command::Slots).await
    }

    /// Wait until nothing is in flight, nothing is being probed and nothing
    /// is ready. Resolves at once when not `Running`.
    pub async fn wait_idle(&self) -> Result<(), OrchestratorError> {
        self.request(Command::WaitIdle).await
    }
}

#[cfg(test)]
#[path = "../orchestrator_tests/mod.rs"]
mod tests;
