// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    zero = { 0, "0s" },
    seconds = { 59, "59s" },
    minutes = { 60, "1m" },
    almost_hour = { 3_599, "59m" },
    hours = { 7_200, "2h" },
    days = { 259_200, "3d" },
)]
fn elapsed(secs: u64, expected: &str) {
    assert_eq!(format_elapsed(secs), expected);
}

#[parameterized(
    never = { None, "-" },
    zero = { Some(0), "-" },
    recent = { Some(995_000), "5s ago" },
    future = { Some(2_000_000), "0s ago" },
)]
fn time_ago(at: Option<u64>, expected: &str) {
    assert_eq!(format_time_ago(at, 1_000_000), expected);
}
