// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use kiln_core::{AssetId, AssetPath};
use kiln_wire::Message;
use std::path::Path;
use tempfile::TempDir;
use yare::parameterized;

fn input(root: &Path, path: &str, output_dir: Option<&Path>) -> TransformInput {
    let path = AssetPath::parse(path).unwrap();
    TransformInput {
        asset: AssetId::generate(),
        source: path.resolve(root),
        path,
        config: serde_json::Value::Null,
        output_dir: output_dir.map(Path::to_path_buf),
    }
}

fn write(root: &Path, path: &str, bytes: &[u8]) {
    let target = root.join(path);
    std::fs::create_dir_all(target.parent().unwrap()).unwrap();
    std::fs::write(target, bytes).unwrap();
}

fn progress(rx: &mut tokio::sync::mpsc::UnboundedReceiver<Message>) -> Vec<f32> {
    let mut fractions = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        if let Message::ProgressUpdate(update) = msg {
            fractions.push(update.fraction);
        }
    }
    fractions
}

#[test]
fn copy_writes_source_into_output_dir() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write(src.path(), "textures/stone.png", b"pixels");

    let (reporter, mut rx) = Reporter::channel();
    let output = CopyTransform
        .run(
            &input(src.path(), "textures/stone.png", Some(out.path())),
            &reporter,
        )
        .unwrap();

    assert_eq!(output.output_hash, ContentHash::of(b"pixels"));
    assert!(output.data.is_empty());
    assert_eq!(
        std::fs::read(out.path().join("textures/stone.png")).unwrap(),
        b"pixels"
    );
    assert_eq!(progress(&mut rx), vec![0.5, 1.0]);
}

#[test]
fn copy_without_output_dir_only_hashes() {
    let src = TempDir::new().unwrap();
    write(src.path(), "a.txt", b"alpha");

    let (reporter, _rx) = Reporter::channel();
    let output = CopyTransform
        .run(&input(src.path(), "a.txt", None), &reporter)
        .unwrap();
    assert_eq!(output.output_hash, ContentHash::of(b"alpha"));
}

#[test]
fn missing_source_names_the_path() {
    let src = TempDir::new().unwrap();
    let (reporter, _rx) = Reporter::channel();
    let err = CopyTransform
        .run(&input(src.path(), "gone.txt", None), &reporter)
        .unwrap_err();
    assert!(matches!(err, TransformError::Io { .. }));
    assert!(err.to_string().contains("gone.txt"));
}

#[test]
fn checksum_writes_digest_file() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write(src.path(), "data/level.bin", b"level one");

    let (reporter, _rx) = Reporter::channel();
    let output = ChecksumTransform
        .run(
            &input(src.path(), "data/level.bin", Some(out.path())),
            &reporter,
        )
        .unwrap();

    let digest = ContentHash::of(b"level one");
    let expected = format!("{}  level.bin\n", digest.to_hex());
    let written = std::fs::read_to_string(out.path().join("data/level.bin.sha256")).unwrap();
    assert_eq!(written, expected);
    assert_eq!(output.output_hash, ContentHash::of(expected.as_bytes()));
    assert_eq!(output.data, digest.as_bytes().to_vec());
}

#[parameterized(
    explicit_sha256 = { serde_json::json!({ "algorithm": "sha256" }), true },
    no_config = { serde_json::Value::Null, true },
    other_keys = { serde_json::json!({ "level": 3 }), true },
    md5 = { serde_json::json!({ "algorithm": "md5" }), false },
)]
fn checksum_algorithm_config(config: serde_json::Value, accepted: bool) {
    let src = TempDir::new().unwrap();
    write(src.path(), "a.txt", b"alpha");
    let mut input = input(src.path(), "a.txt", None);
    input.config = config;

    let (reporter, _rx) = Reporter::channel();
    let result = ChecksumTransform.run(&input, &reporter);
    assert_eq!(result.is_ok(), accepted);
    if let Err(e) = result {
        assert!(matches!(e, TransformError::Config(_)));
    }
}

#[test]
fn checksum_without_output_dir_warns() {
    let src = TempDir::new().unwrap();
    write(src.path(), "a.txt", b"alpha");

    let (reporter, mut rx) = Reporter::channel();
    ChecksumTransform
        .run(&input(src.path(), "a.txt", None), &reporter)
        .unwrap();
    let warned = std::iter::from_fn(|| rx.try_recv().ok()).any(|m| {
        matches!(m, Message::LogLine(line) if line.severity == kiln_core::LogSeverity::Warning)
    });
    assert!(warned);
}
