//! CLI error handling specs
//!
//! Verify error messages for missing or invalid project files.

use crate::prelude::*;

#[test]
fn build_without_config_fails() {
    let temp = Project::empty();
    temp.kiln()
        .args(&["build"])
        .fails()
        .stderr_has("no kiln.toml found");
}

#[test]
fn explicit_config_that_does_not_exist_fails() {
    let temp = Project::empty();
    temp.kiln()
        .args(&["status", "--config", "missing.toml"])
        .fails()
        .stderr_has("failed to read");
}

#[test]
fn unknown_config_key_is_rejected() {
    let temp = Project::empty();
    temp.file("kiln.toml", "[orchestrator]\nworkers = 3\n");
    temp.kiln()
        .args(&["status"])
        .fails()
        .stderr_has("invalid")
        .stderr_has("workers");
}

#[test]
fn zero_slots_is_rejected() {
    let temp = Project::empty();
    temp.file("kiln.toml", "[orchestrator]\nslots = 0\n");
    temp.kiln()
        .args(&["build"])
        .fails()
        .stderr_has("orchestrator.slots must be at least 1");
}

#[test]
fn unknown_asset_is_rejected() {
    let temp = Project::terrain();
    temp.kiln()
        .args(&["hull", "water.txt"])
        .fails()
        .stderr_has("unknown asset: water.txt");
}

#[test]
fn config_is_found_from_a_subdirectory() {
    let temp = Project::terrain();
    temp.kiln()
        .pwd(temp.path().join("assets"))
        .args(&["status"])
        .passes()
        .stdout_has("stone.txt");
}
