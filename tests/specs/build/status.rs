//! Status specs
//!
//! Verify `kiln status` reflects the saved index against current sources.

use crate::prelude::*;

#[test]
fn status_before_any_build_shows_new() {
    let temp = Project::terrain();
    temp.kiln()
        .args(&["status"])
        .passes()
        .stdout_has("PATH")
        .stdout_has("new")
        .stdout_has("3 assets, 3 need building");
}

#[test]
fn status_after_build_shows_success() {
    let temp = Project::terrain();
    temp.kiln().args(&["build"]).passes();
    temp.kiln()
        .args(&["status"])
        .passes()
        .stdout_has("success")
        .stdout_has("3 assets, 0 need building");
}

#[test]
fn edited_source_shows_modified() {
    let temp = Project::terrain();
    temp.kiln().args(&["build"]).passes();
    temp.file("assets/grass.txt", "moss");
    temp.kiln()
        .args(&["status"])
        .passes()
        .stdout_has("modified")
        .stdout_has("3 assets, 1 need building");
}

#[test]
fn missing_source_shows_missing() {
    let temp = Project::terrain();
    std::fs::remove_file(temp.path().join("assets/stone.txt")).unwrap();
    temp.kiln().args(&["status"]).passes().stdout_has("missing");
}

#[test]
fn status_json_has_one_row_per_asset() {
    let temp = Project::terrain();
    temp.kiln().args(&["build"]).passes();
    let run = temp.kiln().args(&["status", "-o", "json"]).passes();
    let rows = run.json();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r["status"] == "success"));
    assert_eq!(rows[2]["id"], TERRAIN);
}

#[test]
fn empty_project_has_no_assets() {
    let temp = Project::empty();
    temp.file("kiln.toml", "");
    temp.kiln()
        .args(&["status"])
        .passes()
        .stdout_eq("No assets declared\n");
}
