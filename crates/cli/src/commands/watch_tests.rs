// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use kiln_adapters::FakeLauncher;
use kiln_core::test_support::{decl, write_source};
use kiln_core::{FakeClock, SequentialIdGen};
use kiln_engine::{OrchestratorConfig, OrchestratorDeps, WorkerCommand};
use kiln_storage::MemoryStore;
use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};
use std::sync::Arc;
use yare::parameterized;

/// `stone.mat` and `textures/stone.png`, both present on disk
fn assets(root: &Path) -> (HashMap<AssetPath, AssetId>, AssetId, AssetId) {
    write_source(root, "textures/stone.png", b"png").unwrap();
    write_source(root, "stone.mat", b"mat").unwrap();
    let stone = AssetId::generate();
    let mat = AssetId::generate();
    let map = HashMap::from([
        (AssetPath::parse("textures/stone.png").unwrap(), stone),
        (AssetPath::parse("stone.mat").unwrap(), mat),
    ]);
    (map, stone, mat)
}

#[test]
fn changed_sources_map_to_their_assets() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let (map, stone, mat) = assets(root);
    let changed = vec![
        root.join("stone.mat"),
        root.join("textures/stone.png"),
        root.join("stone.mat"),
    ];
    assert_eq!(
        plan_changes(root, &changed, &map),
        vec![SourceChange::Changed(mat), SourceChange::Changed(stone)]
    );
}

#[test]
fn undeclared_and_outside_paths_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let (map, _, _) = assets(root);
    let changed = vec![
        root.join("textures/unused.png"),
        PathBuf::from("/game/build/stone.mat"),
        root.to_path_buf(),
    ];
    assert!(plan_changes(root, &changed, &map).is_empty());
}

#[test]
fn deleted_source_is_planned_as_removed() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let (map, stone, mat) = assets(root);
    std::fs::remove_file(root.join("textures/stone.png")).unwrap();

    let changed = vec![root.join("textures/stone.png"), root.join("stone.mat")];
    assert_eq!(
        plan_changes(root, &changed, &map),
        vec![SourceChange::Removed(stone), SourceChange::Changed(mat)]
    );
}

#[test]
fn delete_then_recreate_in_one_batch_is_a_change() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let (map, stone, _) = assets(root);
    std::fs::remove_file(root.join("textures/stone.png")).unwrap();
    write_source(root, "textures/stone.png", b"new png").unwrap();

    // Remove and Create events for the same path arrive together
    let changed = vec![root.join("textures/stone.png"), root.join("textures/stone.png")];
    assert_eq!(
        plan_changes(root, &changed, &map),
        vec![SourceChange::Changed(stone)]
    );
}

#[parameterized(
    create = { EventKind::Create(CreateKind::File), true },
    modify = { EventKind::Modify(ModifyKind::Any), true },
    remove = { EventKind::Remove(RemoveKind::File), true },
    access = { EventKind::Access(AccessKind::Any), false },
    other = { EventKind::Other, false },
)]
fn content_changes(kind: EventKind, expected: bool) {
    assert_eq!(is_content_change(&kind), expected);
}

mod apply {
    use super::*;

    fn orchestrator(root: &Path) -> Orchestrator {
        let config = OrchestratorConfig::new(root, WorkerCommand::new("kiln-worker"));
        Orchestrator::spawn(
            config,
            OrchestratorDeps {
                launcher: FakeLauncher::new(),
                store: Arc::new(MemoryStore::new()),
                clock: FakeClock::new(),
                ids: SequentialIdGen::new("job"),
            },
        )
        .unwrap()
    }

    /// Declares `stone.txt` on disk and in the index
    async fn stone(root: &Path, orch: &Orchestrator) -> HashMap<AssetId, AssetDecl> {
        write_source(root, "stone.txt", b"stone").unwrap();
        let decl = decl("stone.txt", "copy", &[]);
        assert!(orch.discover(decl.clone()).await.unwrap());
        HashMap::from([(decl.id, decl)])
    }

    #[tokio::test]
    async fn removed_source_drops_the_asset() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());
        let decls = stone(dir.path(), &orch).await;
        let id = *decls.keys().next().unwrap();

        std::fs::remove_file(dir.path().join("stone.txt")).unwrap();
        apply(&orch, &decls, SourceChange::Removed(id)).await.unwrap();

        assert!(orch.snapshot().await.unwrap().get(&id).is_none());
    }

    #[tokio::test]
    async fn reappeared_source_is_declared_again() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());
        let decls = stone(dir.path(), &orch).await;
        let id = *decls.keys().next().unwrap();

        apply(&orch, &decls, SourceChange::Removed(id)).await.unwrap();
        write_source(dir.path(), "stone.txt", b"stone again").unwrap();
        apply(&orch, &decls, SourceChange::Changed(id)).await.unwrap();

        let snapshot = orch.snapshot().await.unwrap();
        let record = snapshot.get(&id).unwrap();
        assert_eq!(record.path.as_str(), "stone.txt");
        assert_eq!(record.operation, "copy");
    }

    #[tokio::test]
    async fn edited_source_is_marked_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());
        let decls = stone(dir.path(), &orch).await;
        let id = *decls.keys().next().unwrap();

        apply(&orch, &decls, SourceChange::Changed(id)).await.unwrap();

        assert!(orch.snapshot().await.unwrap().get(&id).unwrap().force_dirty);
    }

    #[tokio::test]
    async fn removing_an_unknown_asset_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());

        apply(&orch, &HashMap::new(), SourceChange::Removed(AssetId::generate()))
            .await
            .unwrap();
        assert!(orch.snapshot().await.unwrap().records.is_empty());
    }
}
