// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn render(table: &Table) -> String {
    let mut buf = Vec::new();
    table.render(&mut buf).unwrap();
    String::from_utf8(buf).unwrap()
}

#[test]
fn empty_table_prints_nothing() {
    let table = Table::plain(vec![Column::left("PATH"), Column::status("STATUS")]);
    assert_eq!(render(&table), "");
}

#[test]
fn columns_pad_to_the_widest_cell() {
    let mut table = Table::plain(vec![Column::left("PATH"), Column::status("STATUS")]);
    table.row(vec!["textures/stone.png".into(), "success".into()]);
    table.row(vec!["a.txt".into(), "failed".into()]);

    assert_eq!(
        render(&table),
        "PATH                STATUS\n\
         textures/stone.png  success\n\
         a.txt               failed\n"
    );
}

#[test]
fn widths_count_chars_not_bytes() {
    let mut table = Table::plain(vec![Column::left("OUT"), Column::left("X")]);
    table.row(vec!["ééééé".into(), "y".into()]);

    let out = render(&table);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines, vec!["OUT    X", "ééééé  y"]);
}

#[test]
fn missing_cells_render_empty() {
    let mut table = Table::plain(vec![Column::left("PATH"), Column::muted("BUILT")]);
    table.row(vec!["a.txt".into()]);

    let out = render(&table);
    assert_eq!(out.lines().nth(1), Some("a.txt  "));
}
