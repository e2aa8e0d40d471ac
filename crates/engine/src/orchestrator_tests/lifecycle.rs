// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn starts_stopped_and_runs_after_start() {
    let ctx = setup().await;
    assert_eq!(ctx.orch.state(), OrchestratorState::Stopped);
    ctx.start().await;
    assert_eq!(ctx.orch.state(), OrchestratorState::Running);

    let slots = ctx.orch.slots().await.unwrap();
    assert_eq!(slots.len(), 2);
    assert!(slots.iter().all(|s| s.state == SlotState::Idle));
}

#[tokio::test]
async fn start_is_only_legal_when_stopped() {
    let ctx = setup().await;
    ctx.start().await;
    let err = ctx.orch.start().await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::InvalidTransition {
            op: "start",
            state: OrchestratorState::Running
        }
    ));
}

#[tokio::test]
async fn stop_is_only_legal_when_running() {
    let ctx = setup().await;
    let err = ctx.orch.stop(false).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::InvalidTransition {
            op: "stop",
            state: OrchestratorState::Stopped
        }
    ));
}

#[tokio::test]
async fn graceful_stop_walks_through_stopping() {
    let mut ctx = setup_with(|c| c.slots = 1).await;
    ctx.build().await;
    ctx.orch.stop(false).await.unwrap();
    ctx.stopped().await;

    let states: Vec<OrchestratorState> = ctx
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            Event::OrchestratorState { state } => Some(state),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![
            OrchestratorState::Running,
            OrchestratorState::Stopping,
            OrchestratorState::Stopped
        ]
    );
    assert!(ctx.orch.slots().await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_catalog_is_idle_at_once() {
    let mut ctx = setup().await;
    ctx.build().await;
    assert!(names(&ctx.drain()).contains(&"orchestrator:idle"));
    assert!(ctx.launcher.requests().is_empty());
}

#[tokio::test]
async fn wait_idle_resolves_when_not_running() {
    let ctx = setup().await;
    ctx.idle().await;
}

#[tokio::test]
async fn restart_after_stop_spawns_fresh_workers() {
    let ctx = setup_with(|c| c.slots = 2).await;
    ctx.build().await;
    ctx.orch.stop(false).await.unwrap();
    ctx.stopped().await;
    ctx.build().await;
    assert_eq!(ctx.launcher.spawn_count(), 4);
}

#[tokio::test]
async fn unsubscribe_stops_delivery() {
    let ctx = setup().await;
    let mut sub = ctx.orch.subscribe();
    assert!(ctx.orch.unsubscribe(sub.id));
    ctx.build().await;
    assert!(sub.try_recv().is_none());
}

#[tokio::test]
async fn dropping_every_handle_kills_workers() {
    let ctx = setup_with(|c| c.slots = 1).await;
    ctx.launcher.set_default(FakeBehavior::Hang);
    ctx.add("a.txt", &[]).await;
    ctx.start().await;
    eventually(|| ctx.launcher.requests().len() == 1).await;

    let TestContext {
        launcher, store, orch, ..
    } = ctx;
    drop(orch);
    eventually(|| store.save_count() > 0).await;
    let saved = store.saved().unwrap();
    assert_eq!(saved.records[0].last_status, TransformStatus::Cancelled);
    assert!(!launcher.kill_worker(SlotId(0)));
}
