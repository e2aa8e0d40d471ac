// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

crate::define_id! {
    /// Test ID type for macro verification.
    pub struct TestId;
}

#[test]
fn define_id_display_and_as_str() {
    let id = TestId::new("hello");
    assert_eq!(id.as_str(), "hello");
    assert_eq!(id.to_string(), "hello");
}

#[test]
fn define_id_serializes_transparently() {
    let json = serde_json::to_string(&TestId::new("abc")).unwrap();
    assert_eq!(json, "\"abc\"");
    let parsed: TestId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, TestId::new("abc"));
}

#[test]
fn sequential_id_gen_counts_from_one() {
    let ids = SequentialIdGen::new("job");
    assert_eq!(ids.next(), "job-1");
    assert_eq!(ids.next(), "job-2");

    // Clones share the counter
    let other = ids.clone();
    assert_eq!(other.next(), "job-3");
}

#[test]
fn uuid_id_gen_is_unique() {
    let ids = UuidIdGen;
    let a = ids.next();
    let b = ids.next();
    assert_ne!(a, b);
    assert_eq!(a.len(), 32);
}
