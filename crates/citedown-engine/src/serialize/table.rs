//! Pipe-table emission.

use super::render_inlines;
use crate::tree::{CellAlign, Table, TableCell, TableRow};

/// Render a table as physical lines: header row, separator row, body rows.
///
/// The header is the explicit head row when present, otherwise the first
/// body row is promoted. The header fixes the column count; other rows are
/// padded or truncated to it. A table with no rows at all renders nothing.
pub(super) fn render_table(table: &Table) -> Vec<String> {
    let (header, body): (&TableRow, &[TableRow]) = match (&table.head, table.body.as_slice()) {
        (Some(head), body) => (head, body),
        (None, [first, rest @ ..]) => (first, rest),
        (None, []) => return Vec::new(),
    };
    let ncols = header.cells.len();
    if ncols == 0 {
        return Vec::new();
    }

    let mut lines = vec![render_row(&header.cells, ncols)];
    lines.push(separator_row(header, body, ncols));
    for row in body {
        lines.push(render_row(&row.cells, ncols));
    }
    lines
}

fn render_row(cells: &[TableCell], ncols: usize) -> String {
    let mut line = String::from("|");
    for i in 0..ncols {
        let rendered = match cells.get(i) {
            Some(cell) => render_inlines(&cell.content, true),
            None => String::new(),
        };
        line.push(' ');
        line.push_str(&rendered);
        line.push_str(" |");
    }
    line
}

fn separator_row(header: &TableRow, body: &[TableRow], ncols: usize) -> String {
    let mut line = String::from("|");
    for i in 0..ncols {
        let align = column_align(header, body, i);
        let token = match align {
            Some(CellAlign::Left) => ":---",
            Some(CellAlign::Right) => "---:",
            Some(CellAlign::Center) => ":---:",
            None => "---",
        };
        line.push(' ');
        line.push_str(token);
        line.push_str(" |");
    }
    line
}

/// Column alignment is taken from the header cell, falling back to the
/// first body cell in that column that declares one.
fn column_align(header: &TableRow, body: &[TableRow], col: usize) -> Option<CellAlign> {
    if let Some(align) = header.cells.get(col).and_then(|c| c.align) {
        return Some(align);
    }
    body.iter()
        .filter_map(|row| row.cells.get(col).and_then(|c| c.align))
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Inline;
    use pretty_assertions::assert_eq;

    fn cell(text: &str, align: Option<CellAlign>) -> TableCell {
        TableCell {
            header: false,
            align,
            class: None,
            content: vec![Inline::text(text)],
        }
    }

    fn row(cells: Vec<TableCell>) -> TableRow {
        TableRow { cells }
    }

    #[test]
    fn header_fixes_column_count() {
        let table = Table {
            class: None,
            head: Some(row(vec![cell("A", None), cell("B", None)])),
            body: vec![
                row(vec![cell("1", None)]),
                row(vec![cell("2", None), cell("3", None), cell("4", None)]),
            ],
        };
        assert_eq!(
            render_table(&table),
            vec![
                "| A | B |",
                "| --- | --- |",
                "| 1 |  |",
                "| 2 | 3 |",
            ]
        );
    }

    #[test]
    fn headless_table_promotes_first_body_row() {
        let table = Table {
            class: None,
            head: None,
            body: vec![
                row(vec![cell("a", None)]),
                row(vec![cell("b", None)]),
            ],
        };
        assert_eq!(
            render_table(&table),
            vec!["| a |", "| --- |", "| b |"]
        );
    }

    #[test]
    fn alignment_falls_back_to_body_cells() {
        let table = Table {
            class: None,
            head: Some(row(vec![cell("A", None), cell("B", Some(CellAlign::Center))])),
            body: vec![row(vec![
                cell("1", Some(CellAlign::Right)),
                cell("2", None),
            ])],
        };
        assert_eq!(render_table(&table)[1], "| ---: | :---: |");
    }

    #[test]
    fn empty_tables_render_nothing() {
        let empty = Table {
            class: None,
            head: None,
            body: vec![],
        };
        assert_eq!(render_table(&empty), Vec::<String>::new());
        let zero_cols = Table {
            class: None,
            head: Some(row(vec![])),
            body: vec![row(vec![cell("x", None)])],
        };
        assert_eq!(render_table(&zero_cols), Vec::<String>::new());
    }
}
