//! mdtable: markdown table editing engine.
//!
//! Finds the pipe table under a cursor, reformats it into aligned columns and
//! performs structural edits (cell navigation, row and column insertion,
//! alignment changes, Enter handling) while keeping the cursor in a sensible
//! place. The editor surface is abstracted behind [`TextHost`]; every
//! operation produces at most one atomic edit.
//!
//! ```
//! use mdtable::{Buffer, Direction, TableEditor, TextHost};
//!
//! let editor = TableEditor::default();
//! let mut buffer = Buffer::new("|a|b|\n|---|---|\n|1|2|", 14);
//! assert!(editor.move_cell(&mut buffer, Direction::Next));
//! assert_eq!(buffer.text(), "| a   | b   |\n| --- | --- |\n| 1   | 2   |");
//! ```

#![forbid(unsafe_code)]

pub mod apply;
pub mod buffer;
pub mod config;
pub mod editor;
pub mod engine;
pub mod error;
pub mod format;
pub mod region;
pub mod tokenizer;

pub use apply::{Applied, EditKind, EditRequest, TextHost, apply, plan_edit};
pub use buffer::Buffer;
pub use config::EditorConfig;
pub use editor::{Outcome, PendingEdit, TableEditor};
pub use engine::{
    ColumnPlacement, Direction, ManualEngine, Operation, RowPlacement, TableContext, TableCursor,
    TableEngine, Transform,
};
pub use error::{Result, TableError};
pub use format::{Alignment, format_table, is_formatted};
pub use region::{LineIndex, TableRegion, find_tables, locate};
pub use tokenizer::{Cell, tokenize};
