// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    zero = { 0, "0" },
    small = { 999, "999" },
    one_k = { 1000, "1.0k" },
    truncated_k = { 1999, "1.9k" },
    under_a_million = { 999_999, "999.9k" },
    one_and_a_half_m = { 1_500_000, "1.5M" },
    big = { 12_345_678, "12.3M" },
)]
fn token_formatting(n: u64, expected: &str) {
    assert_eq!(format_tokens(n), expected);
}

#[yare::parameterized(
    zero = { 0.0, "$0.00" },
    cents = { 0.05, "$0.05" },
    rounded = { 1.005, "$1.00" },
    dollars = { 12.5, "$12.50" },
)]
fn cost_formatting(usd: f64, expected: &str) {
    assert_eq!(format_cost(usd), expected);
}

#[yare::parameterized(
    empty = { 0, 0 },
    one_percent = { 1, 0 },
    five_rounds_up = { 5, 1 },
    half = { 50, 5 },
    fifty_five = { 55, 6 },
    ninety_four = { 94, 9 },
    full = { 100, 10 },
    clamped = { 130, 10 },
)]
fn bar_fill_rounds_half_up(percent: u8, filled: usize) {
    let bar = progress_bar(percent, 10);
    assert_eq!(bar.chars().count(), 10);
    assert_eq!(bar.chars().filter(|&c| c == '█').count(), filled);
}

#[test]
fn clock_wraps_at_midnight() {
    assert_eq!(format_clock(0), "00:00:00");
    assert_eq!(format_clock(86_399_999), "23:59:59");
    assert_eq!(format_clock(86_400_000), "00:00:00");
    // 12:34:56 UTC
    assert_eq!(format_clock(45_296_000), "12:34:56");
}

#[yare::parameterized(
    short = { "fix", "fix" },
    exact = { "12345678901234567890", "12345678901234567890" },
    long = { "123456789012345678901", "1234567890123456789…" },
)]
fn title_truncation(input: &str, expected: &str) {
    assert_eq!(truncate_title(input, 20), expected);
}

#[test]
fn short_id_takes_the_tail() {
    assert_eq!(short_id("agent-1234-99"), "-99");
    assert_eq!(short_id("ab"), "ab");
    assert_eq!(short_id(""), "");
}

#[test]
fn status_tokens_are_width_four() {
    for status in
        [DerivedStatus::Idle, DerivedStatus::Busy, DerivedStatus::Error, DerivedStatus::Dead]
    {
        assert_eq!(status_token(status).len(), 4);
    }
}

#[yare::parameterized(
    busy = { DerivedStatus::Busy, 7, "  7%" },
    busy_full = { DerivedStatus::Busy, 100, "100%" },
    idle = { DerivedStatus::Idle, 50, "-" },
    error = { DerivedStatus::Error, 0, "!" },
    dead = { DerivedStatus::Dead, 0, "X" },
)]
fn indicators(status: DerivedStatus, progress: u8, expected: &str) {
    assert_eq!(status_indicator(status, progress), expected);
}
