// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::Config;
use crate::state::StateDir;
use kiln_core::{AssetId, FailureReason, FingerprintIndex, JobOutcome};
use tempfile::TempDir;

const A: &str = "11111111-1111-4111-8111-111111111111";
const B: &str = "22222222-2222-4222-8222-222222222222";
const C: &str = "33333333-3333-4333-8333-333333333333";

fn project(dir: &TempDir) -> Project {
    let content = format!(
        "[[asset]]\nid = \"{A}\"\npath = \"a.txt\"\noperation = \"copy\"\n\n\
         [[asset]]\nid = \"{B}\"\npath = \"b.txt\"\noperation = \"checksum\"\n\n\
         [[asset]]\nid = \"{C}\"\npath = \"c.txt\"\noperation = \"copy\"\n"
    );
    Project {
        root: dir.path().to_path_buf(),
        config: Config::parse(&content, &dir.path().join("kiln.toml")).unwrap(),
        state: StateDir::new(dir.path().join(".kiln")),
    }
}

fn commit(index: &mut FingerprintIndex, id: AssetId, outcome: JobOutcome) {
    let source = ContentHash::of_file(&index.source_path(&id).unwrap()).ok();
    index.observe_source(&id, source).unwrap();
    let inputs = index.begin_dispatch(&id).unwrap();
    index.commit_result(&id, inputs, &outcome, 5_000).unwrap();
}

#[test]
fn rows_follow_declaration_order_and_index_state() {
    let dir = TempDir::new().unwrap();
    let project = project(&dir);
    for name in ["a.txt", "b.txt", "c.txt"] {
        std::fs::write(dir.path().join(name), name).unwrap();
    }

    let mut index = FingerprintIndex::new(dir.path());
    for decl in project.config.decls().into_iter().take(2) {
        index.discover(decl);
    }
    let (a, b) = (A.parse().unwrap(), B.parse().unwrap());
    commit(
        &mut index,
        a,
        JobOutcome::Succeeded {
            output_hash: ContentHash::of(b"built"),
            data: Vec::new(),
        },
    );
    commit(
        &mut index,
        b,
        JobOutcome::Failed {
            reason: FailureReason::Transform("bad header".into()),
        },
    );

    let rows = status_rows(&project, &index.snapshot(), dir.path());
    let summary: Vec<(&str, &str)> = rows
        .iter()
        .map(|r| (r.path.as_str(), r.status.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![("a.txt", "success"), ("b.txt", "failed"), ("c.txt", "new")]
    );
    assert_eq!(rows[0].output_hash, Some(ContentHash::of(b"built").short(12)));
    assert_eq!(rows[0].last_attempt_ms, Some(5_000));
    assert_eq!(rows[1].reason.as_deref(), Some("transform failed: bad header"));
    assert_eq!(rows[2].id, C);
}

#[test]
fn edited_and_deleted_sources_are_flagged() {
    let dir = TempDir::new().unwrap();
    let project = project(&dir);
    for name in ["a.txt", "b.txt"] {
        std::fs::write(dir.path().join(name), name).unwrap();
    }

    let mut index = FingerprintIndex::new(dir.path());
    for decl in project.config.decls().into_iter().take(2) {
        index.discover(decl);
    }
    for id in [A, B] {
        commit(
            &mut index,
            id.parse().unwrap(),
            JobOutcome::Succeeded {
                output_hash: ContentHash::ZERO,
                data: Vec::new(),
            },
        );
    }
    std::fs::write(dir.path().join("a.txt"), "edited").unwrap();
    std::fs::remove_file(dir.path().join("b.txt")).unwrap();

    let rows = status_rows(&project, &index.snapshot(), dir.path());
    let statuses: Vec<&str> = rows.iter().map(|r| r.status.as_str()).collect();
    assert_eq!(statuses, vec!["modified", "missing", "missing"]);
}

#[test]
fn json_rows_skip_empty_fields() {
    let row = StatusRow {
        path: "a.txt".into(),
        id: A.into(),
        operation: "copy".into(),
        status: "new".into(),
        reason: None,
        output_hash: None,
        last_attempt_ms: None,
    };
    let json = serde_json::to_value(&row).unwrap();
    assert_eq!(
        json,
        serde_json::json!({ "path": "a.txt", "id": A, "operation": "copy", "status": "new" })
    );
}
