// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::transform::{Reporter, TransformError, TransformInput, TransformOutput};
use kiln_core::ContentHash;

struct Fixed(&'static [u8]);

impl Transform for Fixed {
    fn run(&self, _: &TransformInput, _: &Reporter) -> Result<TransformOutput, TransformError> {
        Ok(TransformOutput::new(ContentHash::of(self.0)))
    }
}

#[test]
fn builtins_are_registered() {
    let registry = TransformRegistry::with_builtins();
    assert_eq!(registry.names(), vec!["checksum", "copy"]);
    assert!(registry.get("copy").is_some());
    assert!(registry.get("compress").is_none());
}

#[test]
fn register_replaces_by_name() {
    let mut registry = TransformRegistry::new();
    registry.register("x", Fixed(b"one"));
    registry.register("x", Fixed(b"two"));
    assert_eq!(registry.names(), vec!["x"]);

    let (reporter, _rx) = Reporter::channel();
    let input = TransformInput {
        asset: kiln_core::AssetId::generate(),
        path: kiln_core::AssetPath::parse("a.txt").unwrap(),
        source: "/nonexistent".into(),
        config: serde_json::Value::Null,
        output_dir: None,
    };
    let output = registry.get("x").unwrap().run(&input, &reporter).unwrap();
    assert_eq!(output.output_hash, ContentHash::of(b"two"));
}

#[test]
fn restrict_keeps_only_listed_operations() {
    let registry = TransformRegistry::with_builtins()
        .restrict(&["copy".to_string()])
        .unwrap();
    assert_eq!(registry.names(), vec!["copy"]);
}

#[test]
fn restrict_rejects_unknown_operations() {
    let err = TransformRegistry::with_builtins()
        .restrict(&["copy".to_string(), "compress".to_string()])
        .err()
        .unwrap();
    assert_eq!(err, RegistryError::Unknown("compress".to_string()));
    assert_eq!(err.to_string(), "unknown operation: compress");
}
