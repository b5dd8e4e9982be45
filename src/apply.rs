//! Committing a proposed table rewrite to the host editor.
//!
//! The host owns the document and the cursor. The engine hands it at most
//! one [`EditRequest`] per operation: a single range replacement carrying
//! the new cursor, or a cursor-only move when the text did not change.

use std::ops::Range;

use serde::Serialize;

/// Undo-grouping hint attached to an edit.
///
/// Consecutive `TableMove` edits may be coalesced into one undo step;
/// `TableStructure` edits should open a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EditKind {
    TableMove,
    TableStructure,
}

/// One change for the host to perform atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditRequest {
    /// Replace `range` with `text`; then place the cursor at `cursor` (an
    /// absolute offset in the new document) as part of the same step.
    Replace {
        range: Range<usize>,
        text: String,
        cursor: Option<usize>,
        kind: Option<EditKind>,
    },
    /// Move the cursor without touching the text or the undo history.
    Select { cursor: usize },
}

/// The host editor surface the engine talks to.
pub trait TextHost {
    /// The whole current document.
    fn text(&self) -> &str;
    /// Cursor as a byte offset into [`TextHost::text`].
    fn cursor(&self) -> usize;
    /// Perform one request atomically.
    fn dispatch(&mut self, request: EditRequest);
}

/// What [`apply`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Replaced,
    CursorOnly,
    Nothing,
}

/// Build the request that turns `current[range]` into `new_text`.
///
/// `cursor` is relative to the start of `range`. Returns `None` when there is
/// nothing to do.
pub fn plan_edit(
    current: &str,
    range: Range<usize>,
    new_text: &str,
    cursor: Option<usize>,
    kind: Option<EditKind>,
) -> Option<EditRequest> {
    let absolute = cursor.map(|c| range.start + c);
    if current.get(range.clone()) == Some(new_text) {
        return absolute.map(|cursor| EditRequest::Select { cursor });
    }
    Some(EditRequest::Replace {
        range,
        text: new_text.to_string(),
        cursor: absolute,
        kind,
    })
}

/// Diff `new_text` against the host's text in `range` and dispatch the
/// resulting request, if any.
pub fn apply<H: TextHost + ?Sized>(
    host: &mut H,
    range: Range<usize>,
    new_text: &str,
    cursor: Option<usize>,
    kind: Option<EditKind>,
) -> Applied {
    match plan_edit(host.text(), range, new_text, cursor, kind) {
        Some(request) => {
            let applied = match request {
                EditRequest::Replace { .. } => Applied::Replaced,
                EditRequest::Select { .. } => Applied::CursorOnly,
            };
            host.dispatch(request);
            applied
        }
        None => Applied::Nothing,
    }
}
