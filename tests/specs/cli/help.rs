//! CLI help output specs
//!
//! Verify help text displays for all commands.

use crate::prelude::*;

#[test]
fn kiln_no_args_shows_usage_and_exits_zero() {
    cli().passes().stdout_has("Usage:");
}

#[test]
fn kiln_help_lists_commands() {
    cli()
        .args(&["--help"])
        .passes()
        .stdout_has("build")
        .stdout_has("watch")
        .stdout_has("status")
        .stdout_has("hull");
}

#[test]
fn kiln_build_help_shows_force() {
    cli()
        .args(&["build", "--help"])
        .passes()
        .stdout_has("--force");
}

#[test]
fn kiln_version_shows_version() {
    cli().args(&["--version"]).passes().stdout_has("0.1");
}
