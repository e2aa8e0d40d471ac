// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake launcher for testing
//!
//! Runs scripted in-process workers that speak the real wire protocol over
//! an in-memory duplex pipe, so slots and the orchestrator are exercised
//! exactly as they are against real processes.
#![cfg_attr(coverage_nightly, coverage(off))]

use crate::transport::{
    Channel, ChannelError, ChannelReader, ChannelWriter, LaunchSpec, Launcher, SpawnError,
    WorkerProcess,
};
use async_trait::async_trait;
use kiln_core::{AssetId, ContentHash, LogSeverity, SlotId};
use kiln_wire::{Message, TransformRequest, TransformResult};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;

/// What a fake worker does with one request.
#[derive(Debug, Clone, PartialEq)]
pub enum FakeBehavior {
    /// Reply success; output hash is the digest of the source bytes
    Succeed,
    /// Reply success after a delay
    Delay(Duration),
    /// Stream progress and log lines, then succeed
    Progress(u32),
    /// Reply with a transform failure
    Fail(String),
    /// Exit without replying
    Crash,
    /// Never reply
    Hang,
}

/// Recorded launcher call
#[derive(Debug, Clone)]
pub enum LauncherCall {
    Spawn { spec: LaunchSpec },
    Request { slot: SlotId, request: TransformRequest },
    Kill { slot: SlotId },
}

struct FakeProcessState {
    alive: AtomicBool,
}

struct LiveProcess {
    state: Arc<FakeProcessState>,
    abort: AbortHandle,
}

struct FakeLauncherState {
    scripts: HashMap<String, VecDeque<FakeBehavior>>,
    default: FakeBehavior,
    refuse_spawns: u32,
    calls: Vec<LauncherCall>,
    live: HashMap<SlotId, LiveProcess>,
    /// Assets currently being transformed, with the number of workers on each
    active: HashMap<AssetId, u32>,
    overlaps: u32,
    completed: u32,
}

/// Fake launcher for testing
#[derive(Clone)]
pub struct FakeLauncher {
    inner: Arc<Mutex<FakeLauncherState>>,
}

impl Default for FakeLauncher {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeLauncherState {
                scripts: HashMap::new(),
                default: FakeBehavior::Succeed,
                refuse_spawns: 0,
                calls: Vec::new(),
                live: HashMap::new(),
                active: HashMap::new(),
                overlaps: 0,
                completed: 0,
            })),
        }
    }
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Behavior for requests whose path has no script
    pub fn set_default(&self, behavior: FakeBehavior) {
        self.inner.lock().default = behavior;
    }

    /// Script successive requests for `path`. The last behavior repeats.
    pub fn script(&self, path: &str, behaviors: impl IntoIterator<Item = FakeBehavior>) {
        self.inner
            .lock()
            .scripts
            .insert(path.to_string(), behaviors.into_iter().collect());
    }

    /// Refuse the next `count` spawn attempts
    pub fn refuse_spawns(&self, count: u32) {
        self.inner.lock().refuse_spawns = count;
    }

    /// Kill the live worker of `slot` from outside, as an OOM killer would.
    ///
    /// Returns `false` if the slot has no live worker.
    pub fn kill_worker(&self, slot: SlotId) -> bool {
        let mut inner = self.inner.lock();
        match inner.live.remove(&slot) {
            Some(process) => {
                process.state.alive.store(false, Ordering::SeqCst);
                process.abort.abort();
                true
            }
            None => false,
        }
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<LauncherCall> {
        self.inner.lock().calls.clone()
    }

    /// Requests received by any worker, in arrival order
    pub fn requests(&self) -> Vec<TransformRequest> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                LauncherCall::Request { request, .. } => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn spawn_count(&self) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, LauncherCall::Spawn { .. }))
            .count()
    }

    /// Number of times two workers were transforming the same asset at once
    pub fn overlaps(&self) -> u32 {
        self.inner.lock().overlaps
    }

    /// Number of requests answered with a result
    pub fn completed(&self) -> u32 {
        self.inner.lock().completed
    }

    fn next_behavior(&self, path: &str) -> FakeBehavior {
        let mut inner = self.inner.lock();
        let default = inner.default.clone();
        match inner.scripts.get_mut(path) {
            Some(script) if script.len() > 1 => script.pop_front().unwrap_or(default),
            Some(script) => script.front().cloned().unwrap_or(default),
            None => default,
        }
    }

    fn begin(&self, slot: SlotId, request: &TransformRequest) {
        let mut inner = self.inner.lock();
        inner.calls.push(LauncherCall::Request {
            slot,
            request: request.clone(),
        });
        let count = inner.active.entry(request.asset).or_insert(0);
        *count += 1;
        if *count > 1 {
            inner.overlaps += 1;
        }
    }

    fn finish(&self, asset: &AssetId, replied: bool) {
        let mut inner = self.inner.lock();
        if let Some(count) = inner.active.get_mut(asset) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                inner.active.remove(asset);
            }
        }
        if replied {
            inner.completed += 1;
        }
    }

    async fn run_worker(
        self,
        slot: SlotId,
        mut reader: ChannelReader,
        mut writer: ChannelWriter,
        state: Arc<FakeProcessState>,
    ) {
        while let Ok(msg) = reader.recv().await {
            let request = match msg {
                Message::TransformRequest(request) => request,
                Message::Shutdown => break,
                _ => continue,
            };
            self.begin(slot, &request);
            // Unregisters on every exit path, including abort
            let mut guard = ActiveGuard {
                launcher: self.clone(),
                asset: request.asset,
                replied: false,
            };
            let result = match self.respond(&request, &mut writer).await {
                Ok(Some(result)) => result,
                _ => break,
            };
            // Release the asset before replying so the next dispatch of it
            // never observes this worker as still busy
            guard.replied = true;
            drop(guard);
            if writer.send(&Message::TransformResult(result)).await.is_err() {
                break;
            }
        }
        state.alive.store(false, Ordering::SeqCst);
    }

    /// Work on one request. Returns `None` if the worker should die.
    async fn respond(
        &self,
        request: &TransformRequest,
        writer: &mut ChannelWriter,
    ) -> Result<Option<TransformResult>, ChannelError> {
        let behavior = self.next_behavior(request.path.as_str());
        match behavior {
            FakeBehavior::Succeed => {}
            FakeBehavior::Delay(delay) => tokio::time::sleep(delay).await,
            FakeBehavior::Progress(steps) => {
                for step in 1..=steps {
                    let fraction = step as f32 / steps as f32;
                    writer
                        .send(&Message::progress(fraction, format!("step {step}")))
                        .await?;
                    writer
                        .send(&Message::log(LogSeverity::Info, format!("finished step {step}")))
                        .await?;
                }
            }
            FakeBehavior::Fail(message) => {
                writer
                    .send(&Message::log(LogSeverity::Error, message.clone()))
                    .await?;
                return Ok(Some(TransformResult::failed(message)));
            }
            FakeBehavior::Crash => return Ok(None),
            FakeBehavior::Hang => std::future::pending::<()>().await,
        }

        let output_hash = match tokio::fs::read(&request.source).await {
            Ok(bytes) => ContentHash::of(&bytes),
            Err(_) => ContentHash::of(request.path.as_str().as_bytes()),
        };
        Ok(Some(TransformResult::success(output_hash)))
    }
}

struct ActiveGuard {
    launcher: FakeLauncher,
    asset: AssetId,
    replied: bool,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.launcher.finish(&self.asset, self.replied);
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    async fn spawn(&self, spec: &LaunchSpec) -> Result<Channel, SpawnError> {
        {
            let mut inner = self.inner.lock();
            inner.calls.push(LauncherCall::Spawn { spec: spec.clone() });
            if inner.refuse_spawns > 0 {
                inner.refuse_spawns -= 1;
                return Err(SpawnError::Refused("fake launcher refused".to_string()));
            }
        }

        let (near, far) = tokio::io::duplex(64 * 1024);
        let (near_r, near_w) = tokio::io::split(near);
        let (far_r, far_w) = tokio::io::split(far);
        let worker_reader = ChannelReader::new(Box::new(far_r));
        let worker_writer = ChannelWriter::new(Box::new(far_w));

        let state = Arc::new(FakeProcessState {
            alive: AtomicBool::new(true),
        });
        let task = tokio::spawn(self.clone().run_worker(
            spec.slot,
            worker_reader,
            worker_writer,
            Arc::clone(&state),
        ));
        self.inner.lock().live.insert(
            spec.slot,
            LiveProcess {
                state: Arc::clone(&state),
                abort: task.abort_handle(),
            },
        );

        let process = FakeProcess {
            launcher: self.clone(),
            slot: spec.slot,
            state,
            abort: task.abort_handle(),
        };
        Ok(Channel::new(
            Box::new(near_r),
            Box::new(near_w),
            Box::new(process),
        ))
    }
}

struct FakeProcess {
    launcher: FakeLauncher,
    slot: SlotId,
    state: Arc<FakeProcessState>,
    abort: AbortHandle,
}

#[async_trait]
impl WorkerProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        None
    }

    fn is_alive(&mut self) -> bool {
        self.state.alive.load(Ordering::SeqCst)
    }

    async fn kill(&mut self) -> Result<(), ChannelError> {
        self.state.alive.store(false, Ordering::SeqCst);
        self.abort.abort();
        let mut inner = self.launcher.inner.lock();
        inner.calls.push(LauncherCall::Kill { slot: self.slot });
        if inner
            .live
            .get(&self.slot)
            .is_some_and(|p| Arc::ptr_eq(&p.state, &self.state))
        {
            inner.live.remove(&self.slot);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
