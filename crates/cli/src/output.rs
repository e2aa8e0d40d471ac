// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print `value` as pretty JSON on stdout
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Format elapsed seconds compactly ("5s", "2m", "1h", "3d")
pub fn format_elapsed(secs: u64) -> String {
    match secs {
        0..=59 => format!("{secs}s"),
        60..=3_599 => format!("{}m", secs / 60),
        3_600..=86_399 => format!("{}h", secs / 3_600),
        _ => format!("{}d", secs / 86_400),
    }
}

/// Format an epoch timestamp relative to `now_ms` ("-" when unset)
pub fn format_time_ago(epoch_ms: Option<u64>, now_ms: u64) -> String {
    match epoch_ms {
        Some(at) if at > 0 => format!("{} ago", format_elapsed(now_ms.saturating_sub(at) / 1000)),
        _ => "-".to_string(),
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
