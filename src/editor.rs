//! Entry point for hosts: locate the table under the cursor, run an
//! operation through the engines and hand the result to the host.

use std::ops::Range;
use std::time::Instant;

use tracing::{debug, warn};

use crate::apply::{self, EditKind, EditRequest, TextHost, plan_edit};
use crate::config::EditorConfig;
use crate::engine::{
    ColumnPlacement, Direction, ManualEngine, Operation, RowPlacement, TableContext, TableCursor,
    TableEngine, Transform,
};
use crate::error::{Result, TableError};
use crate::format::Alignment;
use crate::region::{LineIndex, locate};

/// A rewrite ready to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEdit {
    /// Document range of the table region
    pub range: Range<usize>,
    /// Replacement text for `range`
    pub text: String,
    /// Cursor offset relative to `range.start`
    pub cursor: Option<usize>,
    pub kind: Option<EditKind>,
}

/// Answer to "does the editor want this key?".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Run the host's default behavior.
    NotHandled,
    /// Swallow the key; dispatch the request if there is one.
    Handled(Option<EditRequest>),
}

pub struct TableEditor {
    config: EditorConfig,
    preferred: Option<Box<dyn TableEngine>>,
}

impl TableEditor {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            config,
            preferred: None,
        }
    }

    /// Try `engine` first on every operation; errors fall back to the
    /// manual engine.
    pub fn with_engine(mut self, engine: Box<dyn TableEngine>) -> Self {
        self.preferred = Some(engine);
        self
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Compute the edit for `op` with the cursor at byte `cursor` of `text`.
    ///
    /// `None` means the operation does not apply here.
    pub fn prepare(&self, text: &str, cursor: usize, op: Operation) -> Option<PendingEdit> {
        let started = Instant::now();
        let pending = self.run_with_engine(text, cursor, op);

        let elapsed = started.elapsed();
        if elapsed.as_millis() > u128::from(self.config.perf_warn_threshold_ms) {
            warn!(
                op = op.name(),
                elapsed_ms = elapsed.as_millis() as u64,
                threshold_ms = self.config.perf_warn_threshold_ms,
                "slow table operation"
            );
        }
        pending
    }

    /// Like [`TableEditor::prepare`], phrased as the request a host would
    /// dispatch.
    pub fn request(&self, text: &str, cursor: usize, op: Operation) -> Outcome {
        match self.prepare(text, cursor, op) {
            Some(edit) => Outcome::Handled(plan_edit(
                text,
                edit.range,
                &edit.text,
                edit.cursor,
                edit.kind,
            )),
            None => Outcome::NotHandled,
        }
    }

    /// Run `op` against `host`. Returns true when the operation was handled,
    /// whether or not anything changed.
    pub fn run<H: TextHost + ?Sized>(&self, host: &mut H, op: Operation) -> bool {
        let Some(edit) = self.prepare(host.text(), host.cursor(), op) else {
            return false;
        };
        apply::apply(host, edit.range, &edit.text, edit.cursor, edit.kind);
        true
    }

    pub fn move_cell<H: TextHost + ?Sized>(&self, host: &mut H, direction: Direction) -> bool {
        self.run(host, Operation::MoveCell(direction))
    }

    pub fn insert_row<H: TextHost + ?Sized>(&self, host: &mut H, placement: RowPlacement) -> bool {
        self.run(host, Operation::InsertRow(placement))
    }

    pub fn insert_column<H: TextHost + ?Sized>(
        &self,
        host: &mut H,
        placement: ColumnPlacement,
    ) -> bool {
        self.run(host, Operation::InsertColumn(placement))
    }

    pub fn align_column<H: TextHost + ?Sized>(&self, host: &mut H, alignment: Alignment) -> bool {
        self.run(host, Operation::AlignColumn(alignment))
    }

    pub fn handle_enter<H: TextHost + ?Sized>(&self, host: &mut H) -> bool {
        self.run(host, Operation::Enter)
    }

    pub fn format_table<H: TextHost + ?Sized>(&self, host: &mut H) -> bool {
        self.run(host, Operation::Format)
    }

    fn run_with_engine(&self, text: &str, cursor: usize, op: Operation) -> Option<PendingEdit> {
        let index = LineIndex::new(text);
        let (line_no, column) = index.position(cursor);
        let lines: Vec<&str> = text.split('\n').collect();

        let Some(region) = locate(&lines, line_no) else {
            if self.config.debug {
                debug!(line = line_no, op = op.name(), "no table at cursor");
            }
            return None;
        };
        if self.config.debug {
            debug!(
                start = region.start_line,
                end = region.end_line,
                op = op.name(),
                "table region"
            );
        }

        let raw = region.slice(&lines);
        let crlf = raw.first().is_some_and(|line| line.ends_with('\r'));
        let table_lines: Vec<String> = raw
            .iter()
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect();

        let row = line_no - region.start_line;
        let table = TableContext {
            cursor: TableCursor {
                row,
                column: column.min(table_lines[row].len()),
            },
            lines: &table_lines,
            config: &self.config,
        };

        let span = index.span(&region);
        match self.transform(op, &table)? {
            Transform::Declined => None,
            Transform::Unchanged => Some(PendingEdit {
                text: text[span.clone()].to_string(),
                range: span,
                cursor: None,
                kind: None,
            }),
            Transform::Rewrite {
                lines: rewritten,
                cursor,
                kind,
            } => {
                let eol = if crlf { "\r" } else { "" };
                let new_text = rewritten
                    .iter()
                    .map(|line| format!("{line}{eol}"))
                    .collect::<Vec<_>>()
                    .join("\n");
                let cursor = cursor.map(|c| relative_offset(&rewritten, eol.len(), c));
                Some(PendingEdit {
                    range: span,
                    text: new_text,
                    cursor,
                    kind,
                })
            }
        }
    }

    /// Preferred engine first, then the manual one. `None` when both fail.
    fn transform(&self, op: Operation, table: &TableContext<'_>) -> Option<Transform> {
        if let Some(engine) = &self.preferred {
            match engine.transform(op, table).and_then(check_cursor) {
                Ok(transform) => return Some(transform),
                Err(err) => {
                    if self.config.debug {
                        debug!(engine = engine.name(), error = %err, "falling back to manual engine");
                    }
                }
            }
        }

        match ManualEngine.transform(op, table).and_then(check_cursor) {
            Ok(transform) => Some(transform),
            Err(err) => {
                if self.config.debug {
                    warn!(op = op.name(), error = %err, "table operation failed");
                }
                None
            }
        }
    }
}

impl Default for TableEditor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

/// Rejects a rewrite whose cursor row is not one of the rewritten lines.
fn check_cursor(transform: Transform) -> Result<Transform> {
    if let Transform::Rewrite {
        lines,
        cursor: Some(cursor),
        ..
    } = &transform
    {
        if cursor.row >= lines.len() {
            return Err(TableError::CursorOutsideTable {
                row: cursor.row,
                rows: lines.len(),
            });
        }
    }
    Ok(transform)
}

/// Offset of `cursor` from the start of the joined region text. A row past
/// the end lands on the end of the text.
fn relative_offset(lines: &[String], eol_len: usize, cursor: TableCursor) -> usize {
    let row = cursor.row.min(lines.len());
    let before: usize = lines[..row]
        .iter()
        .map(|line| line.len() + eol_len + 1)
        .sum();
    match lines.get(row) {
        Some(line) => before + cursor.column.min(line.len()),
        None => before.saturating_sub(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Buffer;
    use crate::error::{Result, TableError};
    use crate::format::format_table;

    const DOC: &str = "Intro\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\nOutro";

    fn buffer_at(text: &str, needle: &str) -> Buffer {
        let cursor = text.find(needle).unwrap();
        Buffer::new(text, cursor)
    }

    fn line_of(buffer: &Buffer) -> &str {
        let text = buffer.text();
        let start = text[..buffer.cursor()].rfind('\n').map_or(0, |i| i + 1);
        let end = text[buffer.cursor()..]
            .find('\n')
            .map_or(text.len(), |i| buffer.cursor() + i);
        &text[start..end]
    }

    #[test]
    fn test_outside_table_is_not_handled() {
        let editor = TableEditor::default();
        let mut buffer = buffer_at(DOC, "Outro");
        for op in [
            Operation::MoveCell(Direction::Next),
            Operation::InsertRow(RowPlacement::Below),
            Operation::Enter,
            Operation::Format,
        ] {
            assert!(!editor.run(&mut buffer, op));
        }
        assert_eq!(buffer.text(), DOC);
        assert_eq!(buffer.undo_depth(), 0);
    }

    #[test]
    fn test_move_cell_formats_and_moves() {
        let editor = TableEditor::default();
        let mut buffer = buffer_at(DOC, "1 |");
        assert!(editor.move_cell(&mut buffer, Direction::Next));
        assert_eq!(
            buffer.text(),
            "Intro\n\n| a   | b   |\n| --- | --- |\n| 1   | 2   |\n\nOutro"
        );
        assert_eq!(&buffer.text()[buffer.cursor()..buffer.cursor() + 1], "2");
    }

    #[test]
    fn test_move_cell_appends_one_row() {
        let editor = TableEditor::default();
        let mut buffer = buffer_at(DOC, "2 |");
        let before = buffer.text().lines().count();
        editor.move_cell(&mut buffer, Direction::Next);
        assert_eq!(buffer.text().lines().count(), before + 1);
        assert_eq!(line_of(&buffer), "|     |     |");
        assert!(buffer.text().ends_with("|     |     |\n\nOutro"));
    }

    #[test]
    fn test_header_only_skeleton_through_host() {
        let editor = TableEditor::default();
        let mut buffer = Buffer::new("| A | B |", 9);
        assert!(editor.handle_enter(&mut buffer));
        assert_eq!(
            buffer.text(),
            "| A   | B   |\n| --- | --- |\n|     |     |"
        );
        assert_eq!(buffer.cursor(), "| A   | B   |\n| --- | --- |\n| ".len());
    }

    #[test]
    fn test_align_column_changes_only_alignment_row() {
        let editor = TableEditor::default();
        let mut buffer = buffer_at(DOC, "b |");
        assert!(editor.align_column(&mut buffer, Alignment::Right));
        let lines: Vec<&str> = buffer.text().lines().collect();
        assert_eq!(lines[2], "| a | b |");
        assert_eq!(lines[3], "|---|---:|");
        assert_eq!(lines[4], "| 1 | 2 |");
    }

    #[test]
    fn test_format_noop_is_handled_without_edit() {
        let editor = TableEditor::default();
        let text = "| a   | b   |\n| --- | --- |";
        let mut buffer = Buffer::new(text, 3);
        assert!(editor.format_table(&mut buffer));
        assert_eq!(buffer.text(), text);
        assert_eq!(buffer.cursor(), 3);
        assert_eq!(buffer.undo_depth(), 0);
    }

    #[test]
    fn test_request_for_unchanged_move_is_cursor_only() {
        let editor = TableEditor::default();
        let text = "| a   | b   |\n| --- | --- |\n| 1   | 2   |";
        let outcome = editor.request(text, 2, Operation::MoveCell(Direction::Next));
        assert_eq!(
            outcome,
            Outcome::Handled(Some(EditRequest::Select { cursor: 8 }))
        );
        assert_eq!(
            editor.request("text", 0, Operation::Format),
            Outcome::NotHandled
        );
    }

    #[test]
    fn test_crlf_is_preserved() {
        let editor = TableEditor::default();
        let text = "x\r\n|a|b|\r\n|---|---|\r\n|1|2|\r\ny";
        let mut buffer = buffer_at(text, "1|");
        assert!(editor.format_table(&mut buffer));
        assert_eq!(
            buffer.text(),
            "x\r\n| a   | b   |\r\n| --- | --- |\r\n| 1   | 2   |\r\ny"
        );
        assert_eq!(&buffer.text()[buffer.cursor()..buffer.cursor() + 1], "1");
    }

    #[test]
    fn test_moves_on_formatted_table_leave_no_history() {
        let config = EditorConfig {
            auto_format_on_tab: false,
            ..EditorConfig::default()
        };
        let editor = TableEditor::new(config);
        let mut buffer = buffer_at(DOC, "1 |");
        editor.move_cell(&mut buffer, Direction::Next);
        editor.move_cell(&mut buffer, Direction::Prev);
        // No text change: both moves are cursor-only.
        assert_eq!(buffer.undo_depth(), 0);
        assert_eq!(buffer.text(), DOC);
    }

    #[test]
    fn test_undo_reverts_structural_edit() {
        let editor = TableEditor::default();
        let mut buffer = buffer_at(DOC, "1 |");
        editor.insert_row(&mut buffer, RowPlacement::Below);
        assert_ne!(buffer.text(), DOC);
        assert!(buffer.undo());
        assert_eq!(buffer.text(), DOC);
    }

    struct Failing;

    impl TableEngine for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn transform(&self, _op: Operation, _table: &TableContext<'_>) -> Result<Transform> {
            Err(TableError::Engine {
                engine: "failing",
                message: "unavailable".to_string(),
            })
        }
    }

    struct Uppercase;

    impl TableEngine for Uppercase {
        fn name(&self) -> &'static str {
            "uppercase"
        }

        fn transform(&self, _op: Operation, table: &TableContext<'_>) -> Result<Transform> {
            Ok(Transform::Rewrite {
                lines: format_table(table.lines)
                    .iter()
                    .map(|line| line.to_uppercase())
                    .collect(),
                cursor: None,
                kind: Some(EditKind::TableStructure),
            })
        }
    }

    #[test]
    fn test_failing_engine_falls_back_to_manual() {
        let editor = TableEditor::default().with_engine(Box::new(Failing));
        let mut buffer = buffer_at(DOC, "1 |");
        assert!(editor.format_table(&mut buffer));
        assert!(buffer.text().contains("| 1   | 2   |"));
    }

    #[test]
    fn test_preferred_engine_wins() {
        let editor = TableEditor::default().with_engine(Box::new(Uppercase));
        let mut buffer = buffer_at(DOC, "1 |");
        assert!(editor.format_table(&mut buffer));
        assert!(buffer.text().contains("| A   | B   |"));
    }

    struct BadCursor;

    impl TableEngine for BadCursor {
        fn name(&self) -> &'static str {
            "bad-cursor"
        }

        fn transform(&self, _op: Operation, table: &TableContext<'_>) -> Result<Transform> {
            Ok(Transform::Rewrite {
                lines: format_table(table.lines)
                    .iter()
                    .map(|line| line.to_uppercase())
                    .collect(),
                cursor: Some(TableCursor { row: 9, column: 0 }),
                kind: None,
            })
        }
    }

    struct Slow;

    impl TableEngine for Slow {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn transform(&self, _op: Operation, table: &TableContext<'_>) -> Result<Transform> {
            std::thread::sleep(std::time::Duration::from_millis(5));
            Ok(Transform::Rewrite {
                lines: format_table(table.lines),
                cursor: None,
                kind: Some(EditKind::TableStructure),
            })
        }
    }

    #[test]
    fn test_cursor_outside_rewrite_falls_back_to_manual() {
        let config = EditorConfig {
            debug: true,
            ..EditorConfig::default()
        };
        let editor = TableEditor::new(config).with_engine(Box::new(BadCursor));
        let mut buffer = buffer_at(DOC, "1 |");
        assert!(editor.format_table(&mut buffer));
        assert!(buffer.text().contains("| a   | b   |"));
        assert!(!buffer.text().contains("| A"));
        assert!(buffer.cursor() <= buffer.text().len());
    }

    #[test]
    fn test_check_cursor_rejects_missing_row() {
        let rewrite = |row| Transform::Rewrite {
            lines: vec!["| a |".to_string(), "| - |".to_string()],
            cursor: Some(TableCursor { row, column: 0 }),
            kind: None,
        };
        assert!(check_cursor(rewrite(1)).is_ok());
        assert_eq!(
            check_cursor(rewrite(2)),
            Err(TableError::CursorOutsideTable { row: 2, rows: 2 })
        );
        assert!(check_cursor(Transform::Unchanged).is_ok());
    }

    #[test]
    fn test_relative_offset_clamps_row() {
        let lines = vec!["ab".to_string(), "cd".to_string()];
        assert_eq!(relative_offset(&lines, 0, TableCursor { row: 1, column: 1 }), 4);
        assert_eq!(relative_offset(&lines, 0, TableCursor { row: 9, column: 0 }), 5);
    }

    #[test]
    fn test_slow_operation_still_applies() {
        let config = EditorConfig {
            perf_warn_threshold_ms: 0,
            ..EditorConfig::default()
        };
        let editor = TableEditor::new(config).with_engine(Box::new(Slow));
        let mut buffer = buffer_at(DOC, "1 |");
        assert!(editor.format_table(&mut buffer));
        assert_eq!(
            buffer.text(),
            "Intro\n\n| a   | b   |\n| --- | --- |\n| 1   | 2   |\n\nOutro"
        );
    }

    #[test]
    fn test_table_inside_fence_is_ignored() {
        let editor = TableEditor::default();
        let text = "```\n| a | b |\n|---|---|\n```";
        let mut buffer = buffer_at(text, "a |");
        assert!(!editor.format_table(&mut buffer));
        assert_eq!(buffer.text(), text);
    }
}
