//! In-memory [`TextHost`] with a grouped undo history.
//!
//! Used by the command-line front end and by tests. Consecutive
//! `TableMove` replacements share one undo group; every other edit opens a
//! new group. Cursor-only moves never enter the history.

use std::ops::Range;

use crate::apply::{EditKind, EditRequest, TextHost};

/// Inverse of one replacement.
#[derive(Debug, Clone)]
struct Revert {
    /// Range the replacement text now occupies
    range: Range<usize>,
    /// Text it replaced
    removed: String,
    cursor_before: usize,
}

#[derive(Debug, Clone)]
struct UndoGroup {
    kind: Option<EditKind>,
    steps: Vec<Revert>,
}

#[derive(Debug, Clone, Default)]
pub struct Buffer {
    text: String,
    cursor: usize,
    history: Vec<UndoGroup>,
}

impl Buffer {
    /// Create a buffer; `cursor` is clamped to the text and snapped back to a
    /// character boundary.
    pub fn new(text: impl Into<String>, cursor: usize) -> Self {
        let mut buffer = Self {
            text: text.into(),
            cursor: 0,
            history: Vec::new(),
        };
        buffer.set_cursor(cursor);
        buffer
    }

    pub fn into_text(self) -> String {
        self.text
    }

    pub fn set_cursor(&mut self, cursor: usize) {
        let mut cursor = cursor.min(self.text.len());
        while !self.text.is_char_boundary(cursor) {
            cursor -= 1;
        }
        self.cursor = cursor;
    }

    /// Number of undo groups recorded.
    pub fn undo_depth(&self) -> usize {
        self.history.len()
    }

    /// Kind of the most recent undo group.
    pub fn last_kind(&self) -> Option<EditKind> {
        self.history.last().and_then(|group| group.kind)
    }

    /// Revert the most recent undo group. Returns false when there is none.
    pub fn undo(&mut self) -> bool {
        let Some(group) = self.history.pop() else {
            return false;
        };
        let mut cursor = self.cursor;
        for step in group.steps.into_iter().rev() {
            self.text.replace_range(step.range, &step.removed);
            cursor = step.cursor_before;
        }
        self.set_cursor(cursor);
        true
    }

    fn record(&mut self, kind: Option<EditKind>, step: Revert) {
        let coalesce = kind == Some(EditKind::TableMove)
            && self
                .history
                .last()
                .is_some_and(|group| group.kind == Some(EditKind::TableMove));

        match self.history.last_mut() {
            Some(group) if coalesce => group.steps.push(step),
            _ => self.history.push(UndoGroup {
                kind,
                steps: vec![step],
            }),
        }
    }
}

impl TextHost for Buffer {
    fn text(&self) -> &str {
        &self.text
    }

    fn cursor(&self) -> usize {
        self.cursor
    }

    fn dispatch(&mut self, request: EditRequest) {
        match request {
            EditRequest::Replace {
                range,
                text,
                cursor,
                kind,
            } => {
                let end = range.end.min(self.text.len());
                let start = range.start.min(end);
                let removed = self.text[start..end].to_string();
                let cursor_before = self.cursor;
                self.text.replace_range(start..end, &text);
                self.record(
                    kind,
                    Revert {
                        range: start..start + text.len(),
                        removed,
                        cursor_before,
                    },
                );
                self.set_cursor(cursor.unwrap_or(start + text.len()));
            }
            EditRequest::Select { cursor } => self.set_cursor(cursor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replace(range: Range<usize>, text: &str, kind: Option<EditKind>) -> EditRequest {
        EditRequest::Replace {
            range,
            text: text.to_string(),
            cursor: None,
            kind,
        }
    }

    #[test]
    fn test_new_clamps_cursor() {
        let buffer = Buffer::new("abc", 10);
        assert_eq!(buffer.cursor(), 3);
        let buffer = Buffer::new("é", 1);
        assert_eq!(buffer.cursor(), 0);
    }

    #[test]
    fn test_undo_restores_text_and_cursor() {
        let mut buffer = Buffer::new("hello", 2);
        buffer.dispatch(replace(0..5, "HELLO!", Some(EditKind::TableStructure)));
        assert_eq!(buffer.text(), "HELLO!");
        assert_eq!(buffer.cursor(), 6);

        assert!(buffer.undo());
        assert_eq!(buffer.text(), "hello");
        assert_eq!(buffer.cursor(), 2);
        assert!(!buffer.undo());
    }

    #[test]
    fn test_table_moves_coalesce() {
        let mut buffer = Buffer::new("abc", 0);
        buffer.dispatch(replace(0..1, "A", Some(EditKind::TableMove)));
        buffer.dispatch(replace(1..2, "B", Some(EditKind::TableMove)));
        assert_eq!(buffer.undo_depth(), 1);

        buffer.dispatch(replace(2..3, "C", Some(EditKind::TableStructure)));
        buffer.dispatch(replace(0..1, "a", Some(EditKind::TableMove)));
        assert_eq!(buffer.undo_depth(), 3);

        buffer.undo();
        buffer.undo();
        assert_eq!(buffer.text(), "ABc");
        buffer.undo();
        assert_eq!(buffer.text(), "abc");
        assert_eq!(buffer.cursor(), 0);
    }

    #[test]
    fn test_structure_edits_never_coalesce() {
        let mut buffer = Buffer::new("ab", 0);
        buffer.dispatch(replace(0..1, "A", Some(EditKind::TableStructure)));
        buffer.dispatch(replace(1..2, "B", Some(EditKind::TableStructure)));
        assert_eq!(buffer.undo_depth(), 2);
    }

    #[test]
    fn test_select_is_not_recorded() {
        let mut buffer = Buffer::new("abc", 0);
        buffer.dispatch(EditRequest::Select { cursor: 2 });
        assert_eq!(buffer.cursor(), 2);
        assert_eq!(buffer.undo_depth(), 0);
    }
}
