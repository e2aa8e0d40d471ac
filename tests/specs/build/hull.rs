//! Hull specs
//!
//! Verify `kiln hull` lists transitive dependencies.

use crate::prelude::*;

#[test]
fn hull_lists_dependencies() {
    let temp = Project::terrain();
    temp.kiln()
        .args(&["hull", "terrain.txt"])
        .passes()
        .stdout_has("stone.txt")
        .stdout_has("grass.txt")
        .stdout_lacks("terrain.txt");
}

#[test]
fn hull_of_a_leaf_is_empty() {
    let temp = Project::terrain();
    temp.kiln()
        .args(&["hull", STONE])
        .passes()
        .stdout_eq("stone.txt has no dependencies\n");
}

#[test]
fn hull_does_not_write_an_index() {
    let temp = Project::terrain();
    temp.kiln().args(&["hull", "terrain.txt"]).passes();
    assert!(!temp.state_path().join("index.json").exists());
}

#[test]
fn hull_json_carries_ids() {
    let temp = Project::terrain();
    let run = temp.kiln().args(&["hull", "terrain.txt", "-o", "json"]).passes();
    let entries = run.json();
    let mut ids: Vec<&str> = entries
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap())
        .collect();
    ids.sort_unstable();
    let mut expected = vec![STONE, GRASS];
    expected.sort_unstable();
    assert_eq!(ids, expected);
}
