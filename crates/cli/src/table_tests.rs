// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn render_to_string(table: &Table) -> String {
    let mut buf = Vec::new();
    table.render(&mut buf);
    String::from_utf8(buf).unwrap()
}

#[test]
fn empty_table_prints_nothing() {
    let table = Table::plain(vec![Column::left("ID"), Column::status("STATUS")]);
    assert_eq!(render_to_string(&table), "");
}

#[test]
fn columns_pad_to_widest_value() {
    let mut table = Table::plain(vec![Column::left("ID"), Column::status("STATUS")]);
    table.row(vec!["job-1".into(), "running".into()]);
    table.row(vec!["j2".into(), "pending".into()]);

    let out = render_to_string(&table);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines, vec!["ID     STATUS", "job-1  running", "j2     pending"]);
}

#[test]
fn right_aligned_last_column_is_padded() {
    let mut table = Table::plain(vec![Column::left("AGENT"), Column::right("JOBS")]);
    table.row(vec!["a".into(), "5".into()]);
    table.row(vec!["b".into(), "123".into()]);

    let out = render_to_string(&table);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[1], "a         5");
    assert_eq!(lines[2], "b       123");
}

#[test]
fn long_values_are_truncated() {
    let mut table = Table::plain(vec![Column::left("NAME").with_max(4), Column::left("X")]);
    table.row(vec!["deploy-prod".into(), "y".into()]);

    let out = render_to_string(&table);
    assert_eq!(out.lines().nth(1), Some("depl  y"));
}

#[test]
fn missing_cells_render_empty() {
    let mut table = Table::plain(vec![Column::left("A"), Column::left("B")]);
    table.row(vec!["only".into()]);

    let out = render_to_string(&table);
    assert_eq!(out.lines().nth(1), Some("only  "));
}

#[test]
fn colored_table_styles_status_cells() {
    let mut table = Table {
        colorize: true,
        ..Table::plain(vec![Column::status("STATUS")])
    };
    table.row(vec!["failed".into()]);

    let out = render_to_string(&table);
    assert!(out.lines().nth(1).unwrap().starts_with("\x1b[31m"));
}
