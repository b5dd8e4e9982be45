//! Table transformations.
//!
//! An engine receives the raw lines of one table region plus the cursor and
//! returns a [`Transform`]. [`ManualEngine`] is the built-in implementation;
//! hosts may put another [`TableEngine`] in front of it (see
//! [`crate::TableEditor::with_engine`]), and the manual engine takes over
//! whenever that one fails.

use crate::apply::EditKind;
use crate::config::EditorConfig;
use crate::error::{Result, TableError};
use crate::format::{Alignment, MIN_DASHES, format_table, is_alignment_line};
use crate::tokenizer::{cell_anchor, column_at, offset_in_cell, position_in_cell, tokenize};

// ─────────────────────────────────────────────────────────────────────────────
// Operations
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowPlacement {
    Above,
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnPlacement {
    Before,
    After,
}

/// A semantic table operation; the host decides which keys trigger it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    MoveCell(Direction),
    InsertRow(RowPlacement),
    InsertColumn(ColumnPlacement),
    AlignColumn(Alignment),
    Enter,
    Format,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Self::MoveCell(Direction::Next) => "move-cell-next",
            Self::MoveCell(Direction::Prev) => "move-cell-prev",
            Self::InsertRow(RowPlacement::Above) => "insert-row-above",
            Self::InsertRow(RowPlacement::Below) => "insert-row-below",
            Self::InsertColumn(ColumnPlacement::Before) => "insert-column-before",
            Self::InsertColumn(ColumnPlacement::After) => "insert-column-after",
            Self::AlignColumn(Alignment::Left) => "align-left",
            Self::AlignColumn(Alignment::Center) => "align-center",
            Self::AlignColumn(Alignment::Right) => "align-right",
            Self::Enter => "enter",
            Self::Format => "format",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine Interface
// ─────────────────────────────────────────────────────────────────────────────

/// Cursor inside a table: row index within the region and byte column
/// within that row's line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableCursor {
    pub row: usize,
    pub column: usize,
}

/// Everything an engine sees of the document.
#[derive(Debug, Clone, Copy)]
pub struct TableContext<'a> {
    /// Region lines, line endings stripped
    pub lines: &'a [String],
    pub cursor: TableCursor,
    pub config: &'a EditorConfig,
}

/// Result of running an operation on a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform {
    /// Not applicable here; the host should run its default key behavior.
    Declined,
    /// Handled, with nothing to change.
    Unchanged,
    /// New region lines and, optionally, where the cursor goes in them.
    Rewrite {
        lines: Vec<String>,
        cursor: Option<TableCursor>,
        kind: Option<EditKind>,
    },
}

pub trait TableEngine {
    fn name(&self) -> &'static str;

    fn transform(&self, op: Operation, table: &TableContext<'_>) -> Result<Transform>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Manual Engine
// ─────────────────────────────────────────────────────────────────────────────

/// Self-contained implementation of every operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualEngine;

impl TableEngine for ManualEngine {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn transform(&self, op: Operation, table: &TableContext<'_>) -> Result<Transform> {
        let lines = table.lines;
        if table.cursor.row >= lines.len() {
            return Err(TableError::CursorOutsideTable {
                row: table.cursor.row,
                rows: lines.len(),
            });
        }

        // A lone header needs two cells before it can grow into a table.
        if header_cells(lines) < 2 && !has_alignment_row(lines) {
            return Ok(Transform::Declined);
        }

        match op {
            Operation::MoveCell(direction) => move_cell(table, direction),
            Operation::InsertRow(placement) => Ok(insert_row(table, placement)),
            Operation::InsertColumn(placement) => Ok(insert_column(table, placement)),
            Operation::AlignColumn(alignment) => align_column(table, alignment),
            Operation::Enter => Ok(handle_enter(table)),
            Operation::Format => Ok(format_in_place(table)),
        }
    }
}

fn header_cells(lines: &[String]) -> usize {
    lines.first().map_or(0, |header| tokenize(header).len())
}

fn has_alignment_row(lines: &[String]) -> bool {
    lines.len() >= 2 && is_alignment_line(&lines[1])
}

/// Row with `columns` blank cells.
fn empty_row(columns: usize) -> String {
    format!("|{}", "  |".repeat(columns.max(1)))
}

/// Leading whitespace of `line`.
fn indent_of(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

/// Cursor at the start of cell `column` in `lines[row]`.
fn anchored(lines: &[String], row: usize, column: usize) -> TableCursor {
    TableCursor {
        row,
        column: cell_anchor(&lines[row], column),
    }
}

/// Header plus a plain alignment row and one blank data row, formatted, with
/// the cursor in the first data cell.
fn skeleton(header: &str) -> Transform {
    let columns = tokenize(header).len();
    let lines = format_table(&[
        header.to_string(),
        format!("|{}", "---|".repeat(columns)),
        empty_row(columns),
    ]);
    let cursor = anchored(&lines, 2, 0);
    Transform::Rewrite {
        lines,
        cursor: Some(cursor),
        kind: Some(EditKind::TableStructure),
    }
}

/// Insert a blank row at `index`, reformat and put the cursor in its first
/// cell.
fn insert_blank_row(lines: &[String], index: usize) -> Transform {
    let mut rows = lines.to_vec();
    rows.insert(index, empty_row(header_cells(lines)));
    let rows = format_table(&rows);
    let cursor = anchored(&rows, index, 0);
    Transform::Rewrite {
        lines: rows,
        cursor: Some(cursor),
        kind: Some(EditKind::TableStructure),
    }
}

fn move_cell(table: &TableContext<'_>, direction: Direction) -> Result<Transform> {
    let lines = table.lines;
    let TableCursor { row, column } = table.cursor;

    if lines.len() == 1 && direction == Direction::Next {
        return Ok(skeleton(&lines[0]));
    }

    let aligned = has_alignment_row(lines);
    let navigable = |r: usize| !(aligned && r == 1);
    let cells_in = |r: usize| tokenize(&lines[r]).len();
    let current = column_at(&lines[row], column).min(cells_in(row).saturating_sub(1));

    let mut rows = lines.to_vec();
    let mut appended = false;
    let (target_row, target_column) = match direction {
        Direction::Next => {
            if navigable(row) && current + 1 < cells_in(row) {
                (row, current + 1)
            } else if let Some(next) = (row + 1..lines.len()).find(|&r| navigable(r)) {
                (next, 0)
            } else {
                rows.push(empty_row(header_cells(lines)));
                appended = true;
                (rows.len() - 1, 0)
            }
        }
        Direction::Prev => {
            if navigable(row) && current > 0 {
                (row, current - 1)
            } else if let Some(prev) = (0..row).rev().find(|&r| navigable(r)) {
                (prev, cells_in(prev).saturating_sub(1))
            } else {
                // First cell of the table: stay put, but keep the key.
                return Ok(Transform::Unchanged);
            }
        }
    };

    if table.config.auto_format_on_tab || appended {
        rows = format_table(&rows);
    }

    let cursor = anchored(&rows, target_row, target_column);
    let kind = if appended {
        EditKind::TableStructure
    } else {
        EditKind::TableMove
    };
    Ok(Transform::Rewrite {
        lines: rows,
        cursor: Some(cursor),
        kind: Some(kind),
    })
}

fn insert_row(table: &TableContext<'_>, placement: RowPlacement) -> Transform {
    let row = table.cursor.row;
    let mut index = match placement {
        RowPlacement::Above => row,
        RowPlacement::Below => row + 1,
    };
    // Rows never go between the header and the alignment row.
    if has_alignment_row(table.lines) {
        index = index.max(2);
    }
    insert_blank_row(table.lines, index)
}

fn insert_column(table: &TableContext<'_>, placement: ColumnPlacement) -> Transform {
    let lines = table.lines;
    let TableCursor { row, column } = table.cursor;
    let aligned = has_alignment_row(lines);

    let current = column_at(&lines[row], column).min(header_cells(lines).saturating_sub(1));
    let target = match placement {
        ColumnPlacement::Before => current,
        ColumnPlacement::After => current + 1,
    };

    let rows: Vec<String> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let mut cells: Vec<String> = tokenize(line)
                .iter()
                .map(|cell| cell.raw().to_string())
                .collect();
            let filler = if aligned && i == 1 { " --- " } else { "  " };
            cells.insert(target.min(cells.len()), filler.to_string());
            format!("{}|{}|", indent_of(line), cells.join("|"))
        })
        .collect();
    let rows = format_table(&rows);

    let first_data = if aligned { 2 } else { 1 };
    let cursor_row = if first_data < rows.len() { first_data } else { 0 };
    let cursor = anchored(&rows, cursor_row, target);
    Transform::Rewrite {
        lines: rows,
        cursor: Some(cursor),
        kind: Some(EditKind::TableStructure),
    }
}

/// Rewrite the colons of one alignment-row segment. Column widths are left
/// alone.
fn align_column(table: &TableContext<'_>, alignment: Alignment) -> Result<Transform> {
    let lines = table.lines;
    if !has_alignment_row(lines) {
        return Ok(Transform::Declined);
    }

    let TableCursor { row, column } = table.cursor;
    let current = column_at(&lines[row], column).min(header_cells(lines).saturating_sub(1));

    let separator = &lines[1];
    let mut segments: Vec<&str> = separator.split('|').collect();
    let leading = usize::from(segments.first().is_some_and(|s| s.trim().is_empty()));
    let trailing = usize::from(
        segments.len() > leading + 1
            && separator.trim_end().ends_with('|')
            && segments.last().is_some_and(|s| s.trim().is_empty()),
    );
    if current >= segments.len() - leading - trailing {
        return Err(TableError::MissingAlignmentSegment { column: current });
    }

    let index = leading + current;
    let segment = segments[index];
    let dashes = segment.matches('-').count().max(MIN_DASHES);
    let core_start = segment.len() - segment.trim_start().len();
    let core_end = segment.trim_end().len().max(core_start);
    let replacement = format!(
        "{}{}{}",
        &segment[..core_start],
        alignment.marker(dashes),
        &segment[core_end..]
    );
    segments[index] = &replacement;

    let mut rows = lines.to_vec();
    rows[1] = segments.join("|");
    let cursor = TableCursor {
        row,
        column: column.min(rows[row].len()),
    };
    Ok(Transform::Rewrite {
        lines: rows,
        cursor: Some(cursor),
        kind: Some(EditKind::TableStructure),
    })
}

fn handle_enter(table: &TableContext<'_>) -> Transform {
    let lines = table.lines;
    let TableCursor { row, column } = table.cursor;
    let line = &lines[row];

    let at_end = line.get(column..).is_some_and(|rest| rest.trim_end().is_empty());
    if !at_end || !line.contains('|') {
        return Transform::Declined;
    }

    if lines.len() == 1 {
        return if header_cells(lines) >= 2 {
            skeleton(line)
        } else {
            Transform::Declined
        };
    }

    if !has_alignment_row(lines) {
        return Transform::Declined;
    }

    // Below the alignment row when on the header or the alignment row itself.
    insert_blank_row(lines, (row + 1).max(2))
}

fn format_in_place(table: &TableContext<'_>) -> Transform {
    let lines = table.lines;
    if !has_alignment_row(lines) || header_cells(lines) < 2 {
        return Transform::Declined;
    }

    let rows = format_table(lines);
    if rows.as_slice() == lines {
        return Transform::Unchanged;
    }

    // Keep the cursor at the same spot of the same cell.
    let TableCursor { row, column } = table.cursor;
    let (cell, offset) = position_in_cell(&lines[row], column);
    let cursor = TableCursor {
        row,
        column: offset_in_cell(&rows[row], cell, offset),
    };
    Transform::Rewrite {
        lines: rows,
        cursor: Some(cursor),
        kind: None,
    }
}
