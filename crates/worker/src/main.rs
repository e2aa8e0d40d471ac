// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kiln worker (kiln-worker)
//!
//! Spawned by the orchestrator, one process per slot. Frames arrive on
//! stdin and leave on stdout; stderr carries this process's logs.

use anyhow::{bail, Context, Result};
use clap::Parser;
use kiln_worker::{serve, TransformRegistry};
use std::sync::Arc;
use tracing::Instrument;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "kiln-worker", version, about = "Kiln transform worker")]
struct Args {
    /// Required marker; the worker only runs when launched by kiln
    #[arg(long = "kiln-worker")]
    kiln_worker: bool,

    /// Slot this process serves, for log context
    #[arg(long, default_value_t = 0)]
    slot: u32,

    /// Operations to register (default: all built-ins)
    #[arg(long, value_delimiter = ',')]
    operations: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // stdout is the protocol channel; logs must stay on stderr
    let filter = EnvFilter::try_from_env("KILN_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    if !args.kiln_worker {
        bail!("kiln-worker is started by kiln; pass --kiln-worker to run it by hand");
    }

    let mut registry = TransformRegistry::with_builtins();
    if !args.operations.is_empty() {
        registry = registry
            .restrict(&args.operations)
            .context("cannot serve the requested operations")?;
    }

    let span = tracing::info_span!("worker", slot = args.slot);
    span.in_scope(|| tracing::info!(operations = ?registry.names(), "worker ready"));

    serve(tokio::io::stdin(), tokio::io::stdout(), Arc::new(registry))
        .instrument(span.clone())
        .await
        .context("worker channel failed")?;

    span.in_scope(|| tracing::info!("worker exiting"));
    Ok(())
}
