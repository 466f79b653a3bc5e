// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Column-aligned rendering for `ra job list` and `ra agent list`.

use std::io::Write;

use crate::color;

pub enum Align {
    Left,
    Right,
}

/// Styling applied after padding, so escapes never count toward width.
pub enum CellStyle {
    Plain,
    Muted,
    Status,
}

pub struct Column {
    pub name: &'static str,
    pub align: Align,
    pub style: CellStyle,
    /// Longer values are cut to this many characters.
    pub max_width: Option<usize>,
}

impl Column {
    fn new(name: &'static str, align: Align, style: CellStyle) -> Self {
        Self {
            name,
            align,
            style,
            max_width: None,
        }
    }

    pub fn left(name: &'static str) -> Self {
        Self::new(name, Align::Left, CellStyle::Plain)
    }

    pub fn right(name: &'static str) -> Self {
        Self::new(name, Align::Right, CellStyle::Plain)
    }

    pub fn muted(name: &'static str) -> Self {
        Self::new(name, Align::Left, CellStyle::Muted)
    }

    pub fn status(name: &'static str) -> Self {
        Self::new(name, Align::Left, CellStyle::Status)
    }

    pub fn with_max(mut self, max: usize) -> Self {
        self.max_width = Some(max);
        self
    }

    fn cell<'a>(&self, raw: &'a str) -> &'a str {
        match self.max_width {
            Some(max) => raw
                .char_indices()
                .nth(max)
                .map_or(raw, |(end, _)| &raw[..end]),
            None => raw,
        }
    }
}

pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<String>>,
    colorize: bool,
}

const SEP: &str = "  ";

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            colorize: color::should_colorize(),
        }
    }

    #[cfg(test)]
    pub fn plain(columns: Vec<Column>) -> Self {
        Self {
            colorize: false,
            ..Self::new(columns)
        }
    }

    pub fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    /// Header plus rows; nothing at all for an empty table. A trailing
    /// left-aligned column is not padded.
    pub fn render(&self, out: &mut impl Write) {
        if self.rows.is_empty() {
            return;
        }
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                self.rows
                    .iter()
                    .map(|row| col.cell(row.get(i).map_or("", String::as_str)).chars().count())
                    .fold(col.name.len(), usize::max)
            })
            .collect();

        let header: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                let text = self.pad(i, col.name, widths[i]);
                if self.colorize {
                    color::apply_header(&text)
                } else {
                    text
                }
            })
            .collect();
        let _ = writeln!(out, "{}", header.join(SEP));

        for row in &self.rows {
            let cells: Vec<String> = self
                .columns
                .iter()
                .enumerate()
                .map(|(i, col)| {
                    let text = self.pad(i, col.cell(row.get(i).map_or("", String::as_str)), widths[i]);
                    match (&col.style, self.colorize) {
                        (CellStyle::Muted, true) => color::apply_muted(&text),
                        (CellStyle::Status, true) => color::apply_status(&text),
                        _ => text,
                    }
                })
                .collect();
            let _ = writeln!(out, "{}", cells.join(SEP));
        }
    }

    pub fn print(&self) {
        self.render(&mut std::io::stdout());
    }

    fn pad(&self, index: usize, text: &str, width: usize) -> String {
        let last = index + 1 == self.columns.len();
        match self.columns[index].align {
            Align::Left if last => text.to_string(),
            Align::Left => format!("{text:<width$}"),
            Align::Right => format!("{text:>width$}"),
        }
    }
}

#[cfg(test)]
#[path = "table_tests.rs"]
mod tests;
