// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use kiln_core::{ContentHash, IndexError};

#[tokio::test]
async fn builds_every_stale_asset_once() {
    let mut ctx = setup().await;
    let a = ctx.add("a.txt", &[]).await;
    let b = ctx.add("b.txt", &[]).await;
    let c = ctx.add("c.txt", &[]).await;
    ctx.build().await;

    for id in [a, b, c] {
        let record = ctx.record(id).await;
        assert_eq!(record.last_status, TransformStatus::Success);
        assert_eq!(
            record.last_output_hash,
            Some(ContentHash::of(record.path.as_str().as_bytes()))
        );
    }
    assert_eq!(ctx.launcher.requests().len(), 3);
    assert_eq!(ctx.launcher.overlaps(), 0);
    assert_one_job_per_asset(&ctx.drain());
}

#[tokio::test]
async fn chain_builds_dependencies_first() {
    let mut ctx = setup_with(|c| c.slots = 2).await;
    let c = ctx.add("c.txt", &[]).await;
    let b = ctx.add("b.txt", &[c]).await;
    let a = ctx.add("a.txt", &[b]).await;
    ctx.build().await;

    assert_eq!(ctx.requested_paths(), vec!["c.txt", "b.txt", "a.txt"]);

    // Each dispatch happens only after its dependency's success is committed
    let mut committed = Vec::new();
    for event in ctx.drain() {
        match event {
            Event::JobDispatched { asset, .. } if asset == b => assert!(committed.contains(&c)),
            Event::JobDispatched { asset, .. } if asset == a => assert!(committed.contains(&b)),
            Event::JobCompleted {
                asset,
                status: TransformStatus::Success,
                ..
            } => committed.push(asset),
            _ => {}
        }
    }
    assert_eq!(committed, vec![c, b, a]);
}

#[tokio::test]
async fn independent_assets_run_in_parallel() {
    let ctx = setup_with(|c| c.slots = 2).await;
    ctx.launcher
        .set_default(FakeBehavior::Delay(Duration::from_millis(100)));
    ctx.add("a.txt", &[]).await;
    ctx.add("b.txt", &[]).await;
    ctx.start().await;

    eventually(|| ctx.launcher.requests().len() == 2).await;
    assert_eq!(ctx.launcher.completed(), 0);
    ctx.idle().await;
}

#[tokio::test]
async fn up_to_date_assets_are_not_rebuilt() {
    let ctx = setup().await;
    ctx.add("a.txt", &[]).await;
    ctx.build().await;
    ctx.orch.stop(false).await.unwrap();
    ctx.stopped().await;

    ctx.build().await;
    assert_eq!(ctx.launcher.requests().len(), 1);
}

#[tokio::test]
async fn changed_source_rebuilds_asset_and_dependents() {
    let ctx = setup().await;
    let c = ctx.add("c.txt", &[]).await;
    let b = ctx.add("b.txt", &[c]).await;
    ctx.add("other.txt", &[]).await;
    ctx.build().await;
    assert_eq!(ctx.launcher.requests().len(), 3);

    ctx.write("c.txt", b"changed");
    ctx.orch.mark_dirty(c).await.unwrap();
    ctx.idle().await;

    assert_eq!(
        ctx.requested_paths()[3..],
        ["c.txt".to_string(), "b.txt".to_string()]
    );
    assert_eq!(
        ctx.record(b).await.built_dependency_hash,
        ctx.current_dependency_hash(b).await
    );
}

#[tokio::test]
async fn mark_dirty_forces_rebuild_of_unchanged_asset() {
    let mut ctx = setup().await;
    let a = ctx.add("a.txt", &[]).await;
    ctx.build().await;
    ctx.drain();

    ctx.orch.mark_dirty(a).await.unwrap();
    ctx.idle().await;

    assert_eq!(ctx.launcher.requests().len(), 2);
    let events = ctx.drain();
    assert_eq!(names(&events)[0], "asset:dirty");
    assert!(!ctx.record(a).await.force_dirty);
}

#[tokio::test]
async fn mark_dirty_of_unknown_asset_fails() {
    let ctx = setup().await;
    let err = ctx.orch.mark_dirty(AssetId::generate()).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Index(_)));
}

#[tokio::test]
async fn transform_failure_is_committed_and_not_retried() {
    let mut ctx = setup().await;
    ctx.launcher
        .script("bad.txt", [FakeBehavior::Fail("bad header".into())]);
    let bad = ctx.add("bad.txt", &[]).await;
    let dependent = ctx.add("dependent.txt", &[bad]).await;
    ctx.build().await;

    let record = ctx.record(bad).await;
    assert_eq!(record.last_status, TransformStatus::Failed);
    assert_eq!(
        record.last_failure,
        Some(FailureReason::Transform("bad header".into()))
    );
    // Dependent waits for a successful dependency
    assert_eq!(ctx.record(dependent).await.last_status, TransformStatus::Unknown);
    assert_eq!(ctx.requested_paths(), vec!["bad.txt"]);

    // Transform failures are not user-visible asset failures
    assert!(!names(&ctx.drain()).contains(&"asset:failed"));

    // Fixing the source lets both build
    ctx.launcher.script("bad.txt", [FakeBehavior::Succeed]);
    ctx.write("bad.txt", b"fixed");
    ctx.orch.mark_dirty(bad).await.unwrap();
    ctx.idle().await;
    assert_eq!(ctx.record(dependent).await.last_status, TransformStatus::Success);
}

#[tokio::test]
async fn dependency_cycle_fails_members_and_dependents() {
    let mut ctx = setup().await;
    for path in ["a.txt", "b.txt", "c.txt"] {
        ctx.write(path, path.as_bytes());
    }
    let mut a = decl("a.txt", "copy", &[]);
    let b = decl("b.txt", "copy", &[a.id]);
    a.dependencies.push(b.id);
    let c = decl("c.txt", "copy", &[a.id]);
    let (a_id, b_id, c_id) = (a.id, b.id, c.id);
    for d in [a, b, c] {
        ctx.orch.discover(d).await.unwrap();
    }
    ctx.build().await;

    assert!(ctx.launcher.requests().is_empty());
    for id in [a_id, b_id, c_id] {
        let record = ctx.record(id).await;
        assert_eq!(record.last_status, TransformStatus::Failed);
        assert!(matches!(
            record.last_failure,
            Some(FailureReason::DependencyCycle(_))
        ));
    }

    let events = ctx.drain();
    let cycle = events
        .iter()
        .find_map(|e| match e {
            Event::DependencyCycle { cycle } => Some(cycle.clone()),
            _ => None,
        })
        .unwrap();
    assert!(cycle.contains(&a_id) && cycle.contains(&b_id));
    assert!(!cycle.contains(&c_id));

    let err = ctx.orch.hull(a_id).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::Index(IndexError::DependencyCycle(_))
    ));
}

#[tokio::test]
async fn missing_dependency_fails_asset() {
    let ctx = setup().await;
    let ghost = AssetId::generate();
    let a = ctx.add("a.txt", &[ghost]).await;
    ctx.build().await;

    assert_eq!(
        ctx.record(a).await.last_failure,
        Some(FailureReason::MissingDependency(ghost.to_string()))
    );
    assert!(ctx.launcher.requests().is_empty());
}

#[tokio::test]
async fn hull_lists_dependencies_first() {
    let ctx = setup().await;
    let c = ctx.add("c.txt", &[]).await;
    let b = ctx.add("b.txt", &[c]).await;
    let a = ctx.add("a.txt", &[b]).await;
    assert_eq!(ctx.orch.hull(a).await.unwrap(), vec![c, b]);
}

#[tokio::test]
async fn assets_discovered_while_running_are_built() {
    let ctx = setup().await;
    ctx.build().await;
    let late = ctx.add("late.txt", &[]).await;
    ctx.idle().await;
    assert_eq!(ctx.record(late).await.last_status, TransformStatus::Success);
}

#[tokio::test]
async fn removed_asset_is_forgotten() {
    let mut ctx = setup().await;
    let a = ctx.add("a.txt", &[]).await;
    assert!(ctx.orch.remove(a).await.unwrap());
    assert!(!ctx.orch.remove(a).await.unwrap());
    ctx.build().await;

    assert!(ctx.orch.snapshot().await.unwrap().records.is_empty());
    assert!(names(&ctx.drain()).contains(&"asset:removed"));
}

#[tokio::test]
async fn repeated_dirty_marks_never_overlap_jobs() {
    let mut ctx = setup_with(|c| c.slots = 4).await;
    ctx.launcher
        .set_default(FakeBehavior::Delay(Duration::from_millis(20)));
    let a = ctx.add("a.txt", &[]).await;
    let b = ctx.add("b.txt", &[a]).await;
    ctx.build().await;

    for n in 0..10 {
        ctx.write("a.txt", format!("edit {n}").as_bytes());
        ctx.orch.mark_dirty(a).await.unwrap();
        ctx.orch.mark_dirty(b).await.unwrap();
        tokio::time::sleep(Duration::from_millis(7)).await;
    }
    ctx.idle().await;

    assert_eq!(ctx.launcher.overlaps(), 0);
    assert_one_job_per_asset(&ctx.drain());
    assert_eq!(ctx.record(a).await.last_status, TransformStatus::Success);
    assert_eq!(ctx.record(b).await.last_status, TransformStatus::Success);
}

#[tokio::test]
async fn progress_and_logs_are_relayed() {
    let mut ctx = setup().await;
    ctx.launcher.set_default(FakeBehavior::Progress(2));
    ctx.add("a.txt", &[]).await;
    ctx.build().await;

    let events = ctx.drain();
    let progress: Vec<f32> = events
        .iter()
        .filter_map(|e| match e {
            Event::JobProgress { fraction, .. } => Some(*fraction),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![0.5, 1.0]);
    assert_eq!(names(&events).iter().filter(|n| **n == "job:log").count(), 2);
}

#[tokio::test]
async fn job_ids_come_from_the_id_generator() {
    let mut ctx = setup().await;
    ctx.add("a.txt", &[]).await;
    ctx.build().await;
    let dispatched = ctx
        .drain()
        .into_iter()
        .find_map(|e| match e {
            Event::JobDispatched { job, attempt, .. } => Some((job, attempt)),
            _ => None,
        })
        .unwrap();
    assert_eq!(dispatched, (JobId::new("job-1"), 1));
}

impl TestContext {
    /// Dependency hash of `id` as the index computes it now
    async fn current_dependency_hash(&self, id: AssetId) -> Option<ContentHash> {
        let snapshot = self.orch.snapshot().await.unwrap();
        let index = FingerprintIndex::from_snapshot(self.dir.path(), snapshot);
        index.dependency_hash(&id).ok()
    }
}
