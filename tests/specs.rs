//! Behavioral specifications for kiln CLI.
//!
//! These tests are black-box: they invoke the CLI binary and verify
//! stdout, stderr, and exit codes.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

// cli/
#[path = "specs/cli/errors.rs"]
mod cli_errors;
#[path = "specs/cli/help.rs"]
mod cli_help;

// build/
#[path = "specs/build/build.rs"]
mod build_build;
#[path = "specs/build/hull.rs"]
mod build_hull;
#[path = "specs/build/status.rs"]
mod build_status;
