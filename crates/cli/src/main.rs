// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! kiln - incremental asset build orchestrator CLI

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod color;
mod commands;
mod config;
mod env;
mod exit_error;
mod logging;
mod output;
mod project;
mod state;
mod table;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use commands::{build, hull, status, watch};
use output::OutputFormat;
use project::Project;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "kiln",
    version,
    about = "Kiln - incremental asset build orchestrator"
)]
struct Cli {
    /// Path to kiln.toml (default: nearest one at or above the current directory)
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        short = 'o',
        long = "output",
        value_enum,
        default_value_t,
        global = true
    )]
    output: OutputFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every stale asset, then exit
    Build(build::BuildArgs),
    /// Build, then keep rebuilding as sources change
    Watch,
    /// Show the saved build state of each asset
    Status,
    /// List every direct and indirect dependency of an asset
    Hull(hull::HullArgs),
}

fn cli_command() -> clap::Command {
    Cli::command()
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let code = e
            .downcast_ref::<exit_error::ExitError>()
            .map_or(1, |c| c.code);
        let msg = format_error(&e);
        if !msg.is_empty() {
            eprintln!("Error: {}", msg);
        }
        std::process::exit(code);
    }
}

/// Format an anyhow error, deduplicating the chain.
///
/// If the top-level Display already contains the source error text, we skip
/// the "Caused by" chain to avoid noisy duplicate output (common when
/// thiserror variants use `#[error("... {0}")]` with `#[from]`).
/// Otherwise we render the full chain so context isn't lost.
fn format_error(err: &anyhow::Error) -> String {
    let top = err.to_string();

    let chain_redundant = err
        .chain()
        .skip(1)
        .all(|cause| top.contains(&cause.to_string()));

    if chain_redundant {
        return top;
    }

    let mut buf = top;
    for (i, cause) in err.chain().skip(1).enumerate() {
        buf.push_str(&format!("\n\nCaused by:\n    {}: {}", i, cause));
    }
    buf
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.output;

    let Some(command) = cli.command else {
        // No subcommand provided: print help and exit 0
        cli_command().print_help()?;
        println!();
        return Ok(());
    };

    let cwd = std::env::current_dir()?;
    let project = Project::load(&cwd, cli.config.as_deref())?;

    // NOTE(lifetime): flushes the log file when dropped at the end of run()
    let _log_guard = match command {
        Commands::Watch => Some(logging::init_with_file(&project.state.log_path())?),
        _ => {
            logging::init_console();
            None
        }
    };

    match command {
        Commands::Build(args) => build::handle(&project, args, format).await,
        Commands::Watch => watch::handle(&project, format).await,
        Commands::Status => status::handle(&project, format),
        Commands::Hull(args) => hull::handle(&project, args, format).await,
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
