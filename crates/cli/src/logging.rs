// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing setup for the `kiln` binary

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default directives when neither KILN_LOG nor RUST_LOG is set.
///
/// Console output stays quiet so progress lines are readable; the log
/// file gets the full orchestrator trace.
const CONSOLE_DEFAULT: &str = "warn";
const FILE_DEFAULT: &str = "info";

fn filter(default: &str) -> EnvFilter {
    match crate::env::log_filter() {
        Some(directives) => {
            EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(default))
        }
        None => EnvFilter::new(default),
    }
}

/// Log to stderr only
pub fn init_console() {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter(CONSOLE_DEFAULT)),
        )
        .init();
}

/// Log to stderr and to `log_path`.
///
/// The returned guard flushes the file writer on drop; hold it for the
/// life of the process.
pub fn init_with_file(log_path: &Path) -> std::io::Result<WorkerGuard> {
    let dir = log_path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)?;
    let file_name = log_path.file_name().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "log path has no file name")
    })?;

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter(CONSOLE_DEFAULT)),
        )
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(filter(FILE_DEFAULT)),
        )
        .init();

    Ok(guard)
}
