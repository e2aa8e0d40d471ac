// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator tests, driven end to end through `FakeLauncher`.

mod crashes;
mod lifecycle;
mod persistence;
mod scheduling;

use super::*;
use crate::config::{CrashPolicy, WorkerCommand};
use kiln_adapters::{FakeBehavior, FakeLauncher};
use kiln_core::test_support::{decl, write_source};
use kiln_core::{
    Event, FailureReason, FakeClock, FingerprintRecord, SequentialIdGen, TransformStatus,
};
use kiln_storage::MemoryStore;
use std::time::Duration;
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(10);

struct TestContext {
    dir: TempDir,
    launcher: FakeLauncher,
    store: Arc<MemoryStore>,
    orch: Orchestrator,
    events: Subscription,
}

fn config(dir: &TempDir) -> OrchestratorConfig {
    let mut config = OrchestratorConfig::new(dir.path(), WorkerCommand::new("kiln-worker"));
    config.checkpoint_interval = Duration::from_secs(60);
    config
}

async fn setup() -> TestContext {
    setup_with(|_| {}).await
}

async fn setup_with(configure: impl FnOnce(&mut OrchestratorConfig)) -> TestContext {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&dir);
    configure(&mut config);
    spawn_in(dir, config, Arc::new(MemoryStore::new()))
}

fn spawn_in(dir: TempDir, config: OrchestratorConfig, store: Arc<MemoryStore>) -> TestContext {
    let launcher = FakeLauncher::new();
    let orch = Orchestrator::spawn(
        config,
        OrchestratorDeps {
            launcher: launcher.clone(),
            store: store.clone(),
            clock: FakeClock::new(),
            ids: SequentialIdGen::new("job"),
        },
    )
    .unwrap();
    let events = orch.subscribe();
    TestContext {
        dir,
        launcher,
        store,
        orch,
        events,
    }
}

impl TestContext {
    /// Write a source file named after itself and declare it.
    async fn add(&self, path: &str, deps: &[AssetId]) -> AssetId {
        write_source(self.dir.path(), path, path.as_bytes()).unwrap();
        let decl = decl(path, "copy", deps);
        let id = decl.id;
        assert!(self.orch.discover(decl).await.unwrap());
        id
    }

    fn write(&self, path: &str, bytes: &[u8]) {
        write_source(self.dir.path(), path, bytes).unwrap();
    }

    async fn start(&self) {
        self.orch.start().await.unwrap();
    }

    async fn idle(&self) {
        tokio::time::timeout(TIMEOUT, self.orch.wait_idle())
            .await
            .unwrap()
            .unwrap();
    }

    async fn build(&self) {
        self.start().await;
        self.idle().await;
    }

    async fn stopped(&self) {
        tokio::time::timeout(TIMEOUT, self.orch.wait_for_state(OrchestratorState::Stopped))
            .await
            .unwrap()
            .unwrap();
    }

    async fn record(&self, id: AssetId) -> FingerprintRecord {
        self.orch.snapshot().await.unwrap().get(&id).cloned().unwrap()
    }

    /// Paths of every request the workers received, in order
    fn requested_paths(&self) -> Vec<String> {
        self.launcher
            .requests()
            .into_iter()
            .map(|r| r.path.to_string())
            .collect()
    }

    fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// Wait for the first event matching `pred`, discarding the rest
    async fn wait_event(&mut self, pred: impl Fn(&Event) -> bool) -> Event {
        let wait = async {
            loop {
                match self.events.recv().await {
                    Some(event) if pred(&event) => return event,
                    Some(_) => continue,
                    None => panic!("event bus closed"),
                }
            }
        };
        tokio::time::timeout(TIMEOUT, wait).await.unwrap()
    }
}

/// Poll `cond` until it holds
async fn eventually(cond: impl Fn() -> bool) {
    let wait = async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(TIMEOUT, wait).await.unwrap();
}

fn names(events: &[Event]) -> Vec<&str> {
    events.iter().map(Event::name).collect()
}

/// Fails if any asset was dispatched again before its previous job closed.
fn assert_one_job_per_asset(events: &[Event]) {
    let mut open = std::collections::HashSet::new();
    for event in events {
        match event {
            Event::JobDispatched { asset, .. } => {
                assert!(open.insert(*asset), "second job for {asset} while one is open");
            }
            Event::JobCompleted { asset, .. } | Event::JobRequeued { asset, .. } => {
                open.remove(asset);
            }
            _ => {}
        }
    }
}
