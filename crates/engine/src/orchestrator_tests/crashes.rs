// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

/// Start a build whose only asset hangs on its first request, and wait
/// until a worker holds it. Returns the asset and the slot running it.
async fn hanging_build(ctx: &mut TestContext) -> (AssetId, SlotId) {
    ctx.launcher
        .script("a.txt", [FakeBehavior::Hang, FakeBehavior::Succeed]);
    let a = ctx.add("a.txt", &[]).await;
    ctx.start().await;
    let slot = match ctx
        .wait_event(|e| matches!(e, Event::JobDispatched { .. }))
        .await
    {
        Event::JobDispatched { slot, .. } => slot,
        other => panic!("unexpected {other:?}"),
    };
    eventually(|| ctx.launcher.requests().len() == 1).await;
    (a, slot)
}

#[tokio::test]
async fn killed_worker_job_is_requeued_by_default() {
    let mut ctx = setup_with(|c| c.slots = 1).await;
    let (a, slot) = hanging_build(&mut ctx).await;

    assert!(ctx.launcher.kill_worker(slot));
    ctx.idle().await;

    let record = ctx.record(a).await;
    assert_eq!(record.last_status, TransformStatus::Success);
    assert_eq!(ctx.launcher.overlaps(), 0);

    let events = ctx.drain();
    assert_one_job_per_asset(&events);
    let sequence: Vec<&str> = names(&events)
        .into_iter()
        .filter(|n| n.starts_with("slot:") || n.starts_with("job:"))
        .filter(|n| *n != "slot:busy")
        .collect();
    assert_eq!(
        sequence,
        vec![
            "slot:crashed",
            "slot:restarting",
            "slot:idle",
            "job:requeued",
            "job:dispatched",
            "slot:idle",
            "job:completed",
        ]
    );
    let attempts: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            Event::JobDispatched { attempt, .. } => Some(*attempt),
            _ => None,
        })
        .collect();
    assert_eq!(attempts, vec![2]);
}

#[tokio::test]
async fn cancel_policy_commits_cancelled() {
    let mut ctx = setup_with(|c| {
        c.slots = 1;
        c.crash_policy = CrashPolicy::Cancel;
    })
    .await;
    let (a, slot) = hanging_build(&mut ctx).await;

    assert!(ctx.launcher.kill_worker(slot));
    ctx.idle().await;

    assert_eq!(ctx.record(a).await.last_status, TransformStatus::Cancelled);
    assert_eq!(ctx.launcher.requests().len(), 1);
    let slots = ctx.orch.slots().await.unwrap();
    assert_eq!(slots[0].state, SlotState::Idle);
    assert_eq!(slots[0].consecutive_crashes, 1);
}

#[tokio::test]
async fn slot_is_disabled_past_the_crash_ceiling() {
    let mut ctx = setup_with(|c| {
        c.slots = 1;
        c.retry_ceiling = 1;
    })
    .await;
    ctx.launcher.set_default(FakeBehavior::Crash);
    let a = ctx.add("a.txt", &[]).await;
    ctx.build().await;

    let record = ctx.record(a).await;
    assert_eq!(record.last_status, TransformStatus::Failed);
    assert_eq!(record.last_failure, Some(FailureReason::WorkerUnavailable));

    let slots = ctx.orch.slots().await.unwrap();
    assert_eq!(slots[0].state, SlotState::Disabled);
    assert_eq!(slots[0].consecutive_crashes, 2);

    let events = ctx.drain();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::AssetFailed {
            reason: FailureReason::WorkerUnavailable,
            ..
        }
    )));
    // One restart, then disabled
    assert_eq!(ctx.launcher.spawn_count(), 2);
}

#[tokio::test]
async fn asset_that_keeps_crashing_workers_gives_up() {
    let ctx = setup_with(|c| {
        c.slots = 2;
        c.retry_ceiling = 1;
    })
    .await;
    ctx.launcher.script("poison.txt", [FakeBehavior::Crash]);
    let poison = ctx.add("poison.txt", &[]).await;
    ctx.build().await;

    assert_eq!(
        ctx.record(poison).await.last_failure,
        Some(FailureReason::WorkerUnavailable)
    );
    // Both attempts land on the first slot, which is disabled by the second
    assert_eq!(ctx.launcher.requests().len(), 2);
    let states: Vec<SlotState> = ctx
        .orch
        .slots()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.state)
        .collect();
    assert_eq!(states, vec![SlotState::Disabled, SlotState::Idle]);
}

#[tokio::test]
async fn refused_spawns_fail_ready_assets() {
    let mut ctx = setup_with(|c| c.slots = 2).await;
    ctx.launcher.refuse_spawns(u32::MAX);
    let a = ctx.add("a.txt", &[]).await;
    ctx.build().await;

    assert_eq!(
        ctx.record(a).await.last_failure,
        Some(FailureReason::WorkerUnavailable)
    );
    let events = ctx.drain();
    assert_eq!(
        names(&events)
            .iter()
            .filter(|n| **n == "slot:disabled")
            .count(),
        2
    );
    assert!(ctx.launcher.requests().is_empty());
}

#[tokio::test]
async fn healthy_slot_keeps_building_when_another_is_disabled() {
    let ctx = setup_with(|c| c.slots = 2).await;
    ctx.launcher.refuse_spawns(1);
    let a = ctx.add("a.txt", &[]).await;
    let b = ctx.add("b.txt", &[]).await;
    ctx.build().await;

    for id in [a, b] {
        assert_eq!(ctx.record(id).await.last_status, TransformStatus::Success);
    }
    let states: Vec<SlotState> = ctx
        .orch
        .slots()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.state)
        .collect();
    assert_eq!(states, vec![SlotState::Disabled, SlotState::Idle]);
}

#[tokio::test]
async fn forced_stop_cancels_in_flight_jobs() {
    let mut ctx = setup_with(|c| c.slots = 2).await;
    ctx.launcher.set_default(FakeBehavior::Hang);
    let a = ctx.add("a.txt", &[]).await;
    let b = ctx.add("b.txt", &[]).await;
    ctx.start().await;
    eventually(|| ctx.launcher.requests().len() == 2).await;

    ctx.orch.stop(true).await.unwrap();
    ctx.stopped().await;

    for id in [a, b] {
        assert_eq!(ctx.record(id).await.last_status, TransformStatus::Cancelled);
    }
    let events = ctx.drain();
    assert_one_job_per_asset(&events);
    let dispatched = names(&events)
        .iter()
        .filter(|n| **n == "job:dispatched")
        .count();
    let completed = names(&events)
        .iter()
        .filter(|n| **n == "job:completed")
        .count();
    assert_eq!(dispatched, completed);
}

#[tokio::test]
async fn graceful_stop_waits_for_in_flight_jobs() {
    let ctx = setup_with(|c| c.slots = 1).await;
    ctx.launcher
        .set_default(FakeBehavior::Delay(Duration::from_millis(100)));
    let a = ctx.add("a.txt", &[]).await;
    ctx.start().await;
    eventually(|| ctx.launcher.requests().len() == 1).await;

    ctx.orch.stop(false).await.unwrap();
    assert_eq!(ctx.orch.state(), OrchestratorState::Stopping);
    ctx.stopped().await;

    assert_eq!(ctx.record(a).await.last_status, TransformStatus::Success);
}

#[tokio::test]
async fn graceful_stop_escalates_after_timeout() {
    let ctx = setup_with(|c| {
        c.slots = 1;
        c.stop_timeout = Some(Duration::from_millis(50));
    })
    .await;
    ctx.launcher.set_default(FakeBehavior::Hang);
    let a = ctx.add("a.txt", &[]).await;
    ctx.start().await;
    eventually(|| ctx.launcher.requests().len() == 1).await;

    ctx.orch.stop(false).await.unwrap();
    ctx.stopped().await;
    assert_eq!(ctx.record(a).await.last_status, TransformStatus::Cancelled);
}

#[tokio::test]
async fn forced_stop_cuts_a_graceful_stop_short() {
    let ctx = setup_with(|c| c.slots = 1).await;
    ctx.launcher.set_default(FakeBehavior::Hang);
    ctx.add("a.txt", &[]).await;
    ctx.start().await;
    eventually(|| ctx.launcher.requests().len() == 1).await;

    ctx.orch.stop(false).await.unwrap();
    ctx.orch.stop(true).await.unwrap();
    ctx.stopped().await;
    assert!(ctx.orch.slots().await.unwrap().is_empty());
}

#[tokio::test]
async fn cancelled_assets_build_on_next_start() {
    let ctx = setup_with(|c| c.slots = 1).await;
    ctx.launcher.set_default(FakeBehavior::Hang);
    let a = ctx.add("a.txt", &[]).await;
    ctx.start().await;
    eventually(|| ctx.launcher.requests().len() == 1).await;
    ctx.orch.stop(true).await.unwrap();
    ctx.stopped().await;

    ctx.launcher.set_default(FakeBehavior::Succeed);
    ctx.build().await;
    assert_eq!(ctx.record(a).await.last_status, TransformStatus::Success);
}
