// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use std::io::Write;

#[test]
fn of_matches_known_digest() {
    // sha256("abc")
    assert_eq!(
        ContentHash::of(b"abc").to_hex(),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn of_file_matches_of_bytes() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"texture bytes").unwrap();
    let from_file = ContentHash::of_file(file.path()).unwrap();
    assert_eq!(from_file, ContentHash::of(b"texture bytes"));
}

#[test]
fn of_file_missing_is_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(ContentHash::of_file(&dir.path().join("nope.png")).is_err());
}

#[test]
fn of_parts_is_length_delimited() {
    let a = ContentHash::of_parts([b"ab".as_slice(), b"c".as_slice()]);
    let b = ContentHash::of_parts([b"a".as_slice(), b"bc".as_slice()]);
    assert_ne!(a, b);
}

#[test]
fn combine_of_nothing_is_zero() {
    assert_eq!(ContentHash::combine_unordered([]), ContentHash::ZERO);
}

#[test]
fn hex_round_trip_through_serde() {
    let hash = ContentHash::of(b"mesh");
    let json = serde_json::to_string(&hash).unwrap();
    assert_eq!(json, format!("\"{}\"", hash.to_hex()));
    let parsed: ContentHash = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, hash);
}

#[test]
fn from_hex_rejects_short_input() {
    assert!(ContentHash::from_hex("abcd").is_err());
}

#[test]
fn short_truncates() {
    assert_eq!(ContentHash::of(b"abc").short(8), "ba7816bf");
}

proptest! {
    #[test]
    fn combine_is_order_independent(mut parts in proptest::collection::vec(any::<Vec<u8>>(), 0..12)) {
        let forward = ContentHash::combine_unordered(parts.iter().map(|p| ContentHash::of(p)));
        parts.reverse();
        let reversed = ContentHash::combine_unordered(parts.iter().map(|p| ContentHash::of(p)));
        prop_assert_eq!(forward, reversed);
    }
}
