//! Build specs
//!
//! Verify `kiln build` runs transforms in dependency order, skips
//! up-to-date assets, and reports failures.

use crate::prelude::*;

#[test]
fn first_build_runs_every_asset() {
    let temp = Project::terrain();
    temp.kiln()
        .args(&["build"])
        .passes()
        .stdout_has("built stone.txt")
        .stdout_has("built grass.txt")
        .stdout_has("built terrain.txt")
        .stdout_has("3 built, 0 up to date");

    assert_eq!(temp.read("build/stone.txt").as_deref(), Some("stone"));
    assert_eq!(temp.read("build/grass.txt").as_deref(), Some("grass"));
    let checksum = temp.read("build/terrain.txt.sha256").unwrap();
    assert!(checksum.ends_with("  terrain.txt\n"), "{checksum}");
}

#[test]
fn second_build_is_up_to_date() {
    let temp = Project::terrain();
    temp.kiln().args(&["build"]).passes();
    temp.kiln()
        .args(&["build"])
        .passes()
        .stdout_eq("0 built, 3 up to date\n");
}

#[test]
fn changed_source_rebuilds_it_and_its_dependents() {
    let temp = Project::terrain();
    temp.kiln().args(&["build"]).passes();

    temp.file("assets/stone.txt", "granite");
    temp.kiln()
        .args(&["build"])
        .passes()
        .stdout_has("built stone.txt")
        .stdout_has("built terrain.txt")
        .stdout_lacks("built grass.txt")
        .stdout_has("2 built, 1 up to date");
    assert_eq!(temp.read("build/stone.txt").as_deref(), Some("granite"));
}

#[test]
fn force_rebuilds_everything() {
    let temp = Project::terrain();
    temp.kiln().args(&["build"]).passes();
    temp.kiln()
        .args(&["build", "--force"])
        .passes()
        .stdout_has("3 built, 0 up to date");
}

#[test]
fn named_asset_is_rebuilt() {
    let temp = Project::terrain();
    temp.kiln().args(&["build"]).passes();

    // Same bytes out, so the checksum depending on it stays up to date
    temp.kiln()
        .args(&["build", "grass.txt"])
        .passes()
        .stdout_has("built grass.txt")
        .stdout_lacks("built terrain.txt")
        .stdout_has("1 built, 2 up to date");
}

#[test]
fn failing_transform_exits_non_zero() {
    let temp = Project::terrain();
    temp.file(
        "kiln.toml",
        &terrain_config("config = { algorithm = \"md5\" }"),
    );
    temp.kiln()
        .args(&["build"])
        .fails()
        .code(1)
        .stdout_has("failed terrain.txt")
        .stdout_has("2 built, 1 failed, 0 up to date")
        .stderr_has("1 asset(s) failed to build");
}

#[test]
fn failed_asset_is_retried_on_the_next_build() {
    let temp = Project::terrain();
    temp.file(
        "kiln.toml",
        &terrain_config("config = { algorithm = \"md5\" }"),
    );
    temp.kiln().args(&["build"]).fails();

    temp.file("kiln.toml", &terrain_config(""));
    temp.kiln()
        .args(&["build"])
        .passes()
        .stdout_has("built terrain.txt");
}

#[test]
fn json_output_lists_outcomes() {
    let temp = Project::terrain();
    let run = temp.kiln().args(&["build", "-o", "json"]).passes();
    let json = run.json();
    assert_eq!(json["built"], 3);
    assert_eq!(json["failed"], 0);
    let paths: Vec<&str> = json["assets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["path"].as_str().unwrap())
        .collect();
    assert_eq!(paths, vec!["grass.txt", "stone.txt", "terrain.txt"]);
}

#[test]
fn index_is_saved_in_the_state_directory() {
    let temp = Project::terrain();
    temp.kiln().args(&["build"]).passes();
    assert!(temp.state_path().join("index.json").exists());
}

#[test]
fn unchanged_failure_is_still_reported() {
    let temp = Project::terrain();
    temp.file(
        "kiln.toml",
        &terrain_config("config = { algorithm = \"md5\" }"),
    );
    temp.kiln().args(&["build"]).fails();

    // Nothing changed, so nothing runs, but terrain is still not built
    temp.kiln()
        .args(&["build"])
        .fails()
        .code(1)
        .stdout_has("failed terrain.txt:")
        .stdout_has("(inputs unchanged)")
        .stdout_has("0 built, 1 failed, 2 up to date")
        .stderr_has("1 asset(s) failed to build");
}

#[test]
fn dependents_of_a_failure_are_blocked() {
    let temp = Project::terrain();
    temp.file(
        "kiln.toml",
        &format!(
            r#"
[orchestrator]
asset_root = "assets"

[[asset]]
id = "{STONE}"
path = "stone.txt"
operation = "engrave"

[[asset]]
id = "{TERRAIN}"
path = "terrain.txt"
operation = "checksum"
deps = ["{STONE}"]
"#
        ),
    );
    temp.kiln()
        .args(&["build"])
        .fails()
        .code(1)
        .stdout_has("failed stone.txt: transform failed: unknown operation: engrave")
        .stdout_has("blocked terrain.txt: waiting on stone.txt")
        .stdout_has("0 built, 1 failed, 1 blocked, 0 up to date")
        .stderr_has("1 asset(s) failed to build, 1 blocked");

    let run = temp.kiln().args(&["build", "-o", "json"]).fails();
    let json = run.json();
    assert_eq!(json["failed"], 1);
    assert_eq!(json["blocked"], 1);
    assert_eq!(json["up_to_date"], 0);
}
