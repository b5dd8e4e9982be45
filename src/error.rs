//! Error types for table transformations.
//!
//! "Not a table" is not an error: operations report it through
//! [`crate::Transform::Declined`]. `TableError` covers transformations that
//! started on a table and then hit input they could not make sense of.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    /// The cursor row does not belong to the region handed to the engine.
    #[error("cursor row {row} is outside a table of {rows} line(s)")]
    CursorOutsideTable { row: usize, rows: usize },

    /// The alignment row has no segment for the requested column.
    #[error("alignment row has no segment for column {column}")]
    MissingAlignmentSegment { column: usize },

    /// A preferred engine gave up; the manual engine takes over.
    #[error("engine '{engine}' failed: {message}")]
    Engine {
        engine: &'static str,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, TableError>;
