// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker slot: one worker process and the job it is running.
//!
//! A slot is owned by the control task. Its reader task blocks on the
//! channel and forwards every inbound frame to the slot inbox, nudging the
//! control task through the shared wake channel; `poll` drains the inbox
//! without waiting. Each spawned process gets a new generation number and
//! anything still queued from an older generation is discarded.

use crate::error::SlotError;
use crate::event_bus::EventBus;
use kiln_adapters::{ChannelReader, ChannelWriter, LaunchSpec, Launcher, WorkerProcess};
use kiln_core::{
    Event, FailureReason, Job, JobId, JobOutcome, LogEntry, SlotId, SlotState, AssetId,
};
use kiln_wire::{Message, ResultStatus, TransformRequest, TransformResult};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// How long a worker gets to exit after `Shutdown` before it is killed
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// What happened on a slot since the last poll
#[derive(Debug, Clone, PartialEq)]
pub enum SlotEvent {
    Progress {
        job: JobId,
        asset: AssetId,
        fraction: f32,
        label: String,
    },
    Log {
        job: JobId,
        asset: AssetId,
        entry: LogEntry,
    },
    /// The worker answered; the slot is idle again
    Completed { job: Job, outcome: JobOutcome },
    /// The worker died. `job` is the job it was running, if any.
    Crashed { job: Option<Job>, disabled: bool },
}

/// Static settings for a slot
#[derive(Debug, Clone)]
pub struct SlotOptions {
    pub spec: LaunchSpec,
    pub retry_ceiling: u32,
    pub asset_root: PathBuf,
    pub output_dir: Option<PathBuf>,
}

enum Inbound {
    Message(Message),
    Broken(String),
}

struct InboxItem {
    generation: u64,
    inbound: Inbound,
}

pub struct Slot<L> {
    id: SlotId,
    launcher: L,
    options: SlotOptions,
    bus: EventBus,
    state: SlotState,
    writer: Option<ChannelWriter>,
    process: Option<Box<dyn WorkerProcess>>,
    reader_task: Option<JoinHandle<()>>,
    current_job: Option<Job>,
    consecutive_crashes: u32,
    generation: u64,
    inbox_tx: mpsc::UnboundedSender<InboxItem>,
    inbox_rx: mpsc::UnboundedReceiver<InboxItem>,
    wake: mpsc::Sender<()>,
    /// Events produced outside the inbox (e.g. a failed send)
    pending: VecDeque<SlotEvent>,
}

impl<L: Launcher> Slot<L> {
    pub fn new(launcher: L, options: SlotOptions, bus: EventBus, wake: mpsc::Sender<()>) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            id: options.spec.slot,
            launcher,
            options,
            bus,
            state: SlotState::Offline,
            writer: None,
            process: None,
            reader_task: None,
            current_job: None,
            consecutive_crashes: 0,
            generation: 0,
            inbox_tx,
            inbox_rx,
            wake,
            pending: VecDeque::new(),
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn current_job(&self) -> Option<&Job> {
        self.current_job.as_ref()
    }

    pub fn consecutive_crashes(&self) -> u32 {
        self.consecutive_crashes
    }

    pub fn is_busy(&self) -> bool {
        self.current_job.is_some()
    }

    /// Spawn the worker. A refused spawn disables the slot.
    ///
    /// Returns `true` if the slot is idle afterwards.
    pub async fn start(&mut self) -> bool {
        if self.state != SlotState::Offline {
            return self.state == SlotState::Idle;
        }
        match self.spawn().await {
            Ok(()) => {
                self.transition(SlotState::Idle);
                true
            }
            Err(reason) => {
                self.disable(reason);
                false
            }
        }
    }

    /// Send `job` to the worker. Legal only from `Idle`.
    ///
    /// A send failure is a crash: it is reported through `poll` like any
    /// other, with the job attached.
    pub async fn assign_job(&mut self, job: Job) -> Result<(), SlotError> {
        if self.state != SlotState::Idle {
            return Err(SlotError::NotIdle(self.state));
        }
        let request = Message::TransformRequest(TransformRequest {
            asset: job.asset,
            path: job.path.clone(),
            source: job.path.resolve(&self.options.asset_root),
            operation: job.operation.clone(),
            config: job.config.clone(),
            output_dir: self.options.output_dir.clone(),
        });
        let job_id = job.id.clone();
        let asset = job.asset;
        self.current_job = Some(job);
        self.state = SlotState::Busy;
        tracing::debug!(slot = %self.id, job = %job_id, "busy");
        self.bus.publish(Event::SlotBusy {
            slot: self.id,
            job: job_id,
            asset,
        });

        let sent = match self.writer.as_mut() {
            Some(writer) => writer.send(&request).await.map_err(|e| e.to_string()),
            None => Err("no writer".to_string()),
        };
        if let Err(reason) = sent {
            tracing::warn!(slot = %self.id, error = %reason, "request send failed");
            let event = self.crash(reason).await;
            self.pending.push_back(event);
        }
        Ok(())
    }

    /// Next event, without waiting for the worker.
    ///
    /// A crash is handled in full before this returns: the slot is either
    /// idle on a fresh process or disabled.
    pub async fn poll(&mut self) -> Option<SlotEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }
        loop {
            let item = self.inbox_rx.try_recv().ok()?;
            if item.generation != self.generation {
                continue;
            }
            match item.inbound {
                Inbound::Broken(reason) => return Some(self.crash(reason).await),
                Inbound::Message(msg) => {
                    if let Some(event) = self.on_message(msg).await {
                        return Some(event);
                    }
                }
            }
        }
    }

    async fn on_message(&mut self, msg: Message) -> Option<SlotEvent> {
        let Some(job) = self.current_job.as_ref() else {
            return Some(
                self.crash(format!("unsolicited {:?} frame", msg.kind()))
                    .await,
            );
        };
        match msg {
            Message::ProgressUpdate(update) => Some(SlotEvent::Progress {
                job: job.id.clone(),
                asset: job.asset,
                fraction: update.fraction,
                label: update.label,
            }),
            Message::LogLine(line) => Some(SlotEvent::Log {
                job: job.id.clone(),
                asset: job.asset,
                entry: LogEntry {
                    severity: line.severity,
                    text: line.text,
                },
            }),
            Message::TransformResult(result) => {
                let job = self.current_job.take()?;
                self.consecutive_crashes = 0;
                self.transition(SlotState::Idle);
                Some(SlotEvent::Completed {
                    job,
                    outcome: outcome_of(result),
                })
            }
            Message::TransformRequest(_) | Message::Shutdown => {
                Some(self.crash(format!("unexpected {:?} frame", msg.kind())).await)
            }
        }
    }

    /// Tear down the dead process and try to come back.
    async fn crash(&mut self, reason: String) -> SlotEvent {
        let job = self.current_job.take();
        self.teardown().await;
        self.consecutive_crashes += 1;
        tracing::warn!(
            slot = %self.id,
            crashes = self.consecutive_crashes,
            job = ?job.as_ref().map(|j| j.id.as_str()),
            reason,
            "worker crashed"
        );
        self.state = SlotState::Crashed;
        self.bus.publish(Event::SlotCrashed {
            slot: self.id,
            job: job.as_ref().map(|j| j.id.clone()),
            consecutive_crashes: self.consecutive_crashes,
        });

        loop {
            if self.consecutive_crashes > self.options.retry_ceiling {
                self.disable(format!(
                    "{} consecutive crashes, last: {reason}",
                    self.consecutive_crashes
                ));
                return SlotEvent::Crashed {
                    job,
                    disabled: true,
                };
            }
            self.transition(SlotState::Restarting);
            match self.spawn().await {
                Ok(()) => {
                    self.transition(SlotState::Idle);
                    return SlotEvent::Crashed {
                        job,
                        disabled: false,
                    };
                }
                Err(e) => {
                    // A failed respawn counts as another crash
                    self.consecutive_crashes += 1;
                    tracing::warn!(slot = %self.id, error = %e, "respawn failed");
                }
            }
        }
    }

    /// Stop the worker and go offline. Returns the job that was running.
    ///
    /// Graceful shutdown asks the worker to exit first; either way the
    /// process is killed before this returns.
    pub async fn shutdown(&mut self, force: bool) -> Option<Job> {
        if !force {
            if let Some(writer) = self.writer.as_mut() {
                let _ = writer.send(&Message::Shutdown).await;
            }
            if let Some(process) = self.process.as_mut() {
                let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
                while process.is_alive() && tokio::time::Instant::now() < deadline {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
        self.kill().await
    }

    /// Force-kill the worker and go offline. Returns the job that was
    /// running.
    pub async fn kill(&mut self) -> Option<Job> {
        let job = self.current_job.take();
        self.teardown().await;
        self.pending.clear();
        if self.state != SlotState::Offline {
            self.transition(SlotState::Offline);
        }
        job
    }

    async fn spawn(&mut self) -> Result<(), String> {
        let channel = self
            .launcher
            .spawn(&self.options.spec)
            .await
            .map_err(|e| e.to_string())?;
        let (reader, writer, process) = channel.split();
        self.generation += 1;
        self.reader_task = Some(tokio::spawn(read_loop(
            reader,
            self.generation,
            self.inbox_tx.clone(),
            self.wake.clone(),
        )));
        self.writer = Some(writer);
        self.process = Some(process);
        Ok(())
    }

    /// Kill the process and stop listening to it.
    async fn teardown(&mut self) {
        // Anything the old reader still delivers is from a dead generation
        self.generation += 1;
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        self.writer = None;
        if let Some(mut process) = self.process.take() {
            if let Err(e) = process.kill().await {
                tracing::warn!(slot = %self.id, error = %e, "kill failed");
            }
        }
    }

    fn disable(&mut self, reason: String) {
        tracing::error!(slot = %self.id, reason, "slot disabled");
        self.state = SlotState::Disabled;
        self.bus.publish(Event::SlotDisabled {
            slot: self.id,
            reason,
        });
    }

    fn transition(&mut self, state: SlotState) {
        tracing::debug!(slot = %self.id, from = %self.state, to = %state, "slot transition");
        self.state = state;
        let slot = self.id;
        let event = match state {
            SlotState::Idle => Event::SlotIdle { slot },
            SlotState::Restarting => Event::SlotRestarting { slot },
            SlotState::Offline => Event::SlotOffline { slot },
            // Published with their details where they happen
            SlotState::Busy | SlotState::Crashed | SlotState::Disabled => return,
        };
        self.bus.publish(event);
    }
}

fn outcome_of(result: TransformResult) -> JobOutcome {
    match (result.status, result.output_hash) {
        (ResultStatus::Success, Some(output_hash)) => JobOutcome::Succeeded {
            output_hash,
            data: result.data,
        },
        (ResultStatus::Success, None) => JobOutcome::failed(FailureReason::Transform(
            "worker reported success without an output hash".to_string(),
        )),
        (ResultStatus::Failed, _) => JobOutcome::failed(FailureReason::Transform(result.message)),
    }
}

async fn read_loop(
    mut reader: ChannelReader,
    generation: u64,
    inbox: mpsc::UnboundedSender<InboxItem>,
    wake: mpsc::Sender<()>,
) {
    loop {
        let (inbound, done) = match reader.recv().await {
            Ok(msg) => (Inbound::Message(msg), false),
            Err(e) => (Inbound::Broken(e.to_string()), true),
        };
        if inbox.send(InboxItem { generation, inbound }).is_err() {
            return;
        }
        // Non-blocking wake - if channel is full, control task is already awake
        let _ = wake.try_send(());
        if done {
            return;
        }
    }
}

#[cfg(test)]
#[path = "slot_tests.rs"]
mod tests;
