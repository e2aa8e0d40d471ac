// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn stop_saves_the_index() {
    let ctx = setup().await;
    let a = ctx.add("a.txt", &[]).await;
    ctx.build().await;
    ctx.orch.stop(false).await.unwrap();
    ctx.stopped().await;

    let saved = ctx.store.saved().unwrap();
    let record = saved.get(&a).unwrap();
    assert_eq!(record.last_status, TransformStatus::Success);
    assert!(record.built_source_hash.is_some());
}

#[tokio::test]
async fn saved_index_survives_a_new_orchestrator() {
    let first = setup().await;
    first.add("a.txt", &[]).await;
    first.add("b.txt", &[]).await;
    first.build().await;
    first.orch.stop(false).await.unwrap();
    first.stopped().await;

    let TestContext { dir, store, .. } = first;
    let saved = store.saved().unwrap();
    let config = config(&dir);
    let second = spawn_in(dir, config, Arc::new(MemoryStore::with_snapshot(saved)));
    assert_eq!(second.orch.snapshot().await.unwrap().records.len(), 2);

    second.build().await;
    assert!(second.launcher.requests().is_empty());
}

#[tokio::test]
async fn edits_between_sessions_are_picked_up() {
    let first = setup().await;
    let a = first.add("a.txt", &[]).await;
    first.add("b.txt", &[]).await;
    first.build().await;
    first.orch.stop(false).await.unwrap();
    first.stopped().await;

    let TestContext { dir, store, .. } = first;
    write_source(dir.path(), "a.txt", b"edited offline").unwrap();
    let config = config(&dir);
    let second = spawn_in(dir, config, store);
    second.build().await;

    let paths = second.requested_paths();
    assert_eq!(paths, vec!["a.txt"]);
    assert_eq!(
        second.record(a).await.built_source_hash,
        Some(kiln_core::ContentHash::of(b"edited offline"))
    );
}

#[tokio::test]
async fn checkpoints_save_while_running() {
    let ctx = setup_with(|c| c.checkpoint_interval = Duration::from_millis(20)).await;
    ctx.add("a.txt", &[]).await;
    ctx.build().await;

    eventually(|| {
        ctx.store
            .saved()
            .is_some_and(|s| s.records.first().is_some_and(|r| r.last_status == TransformStatus::Success))
    })
    .await;
    assert_eq!(ctx.orch.state(), OrchestratorState::Running);
}

#[tokio::test]
async fn nothing_is_saved_without_changes() {
    let ctx = setup_with(|c| c.checkpoint_interval = Duration::from_millis(10)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ctx.store.save_count(), 0);
}
