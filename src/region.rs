//! Table region detection.
//!
//! A region is a maximal run of table-like lines. Detection is line based
//! and re-run from scratch on every operation.

use std::ops::Range;

use crate::tokenizer::pipe_offsets;

/// Inclusive, 1-based line range of one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRegion {
    /// First line of the table (1-based, inclusive)
    pub start_line: usize,
    /// Last line of the table (1-based, inclusive)
    pub end_line: usize,
}

impl TableRegion {
    pub fn line_count(&self) -> usize {
        self.end_line - self.start_line + 1
    }

    pub fn contains(&self, line: usize) -> bool {
        (self.start_line..=self.end_line).contains(&line)
    }

    /// 0-based index of `line` within the region.
    pub fn row_of(&self, line: usize) -> Option<usize> {
        self.contains(line).then(|| line - self.start_line)
    }

    /// The region's lines, borrowed from the whole document.
    pub fn slice<'a, S: AsRef<str>>(&self, lines: &'a [S]) -> Vec<&'a str> {
        lines[self.start_line - 1..self.end_line]
            .iter()
            .map(|l| l.as_ref())
            .collect()
    }
}

/// Opening marker of a fenced code block (```` ``` ```` or `~~~`).
fn fence_marker(line: &str) -> Option<char> {
    let trimmed = line.trim_start();
    if trimmed.starts_with("```") {
        Some('`')
    } else if trimmed.starts_with("~~~") {
        Some('~')
    } else {
        None
    }
}

fn is_blockquote(line: &str) -> bool {
    line.trim_start().starts_with('>')
}

/// Whether a line can be part of a table.
///
/// Requires a separator pipe that is interior to the line, or at least two
/// separator pipes (`| a |`). Fence delimiters and blockquotes never qualify.
pub fn is_table_like(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || fence_marker(trimmed).is_some() || is_blockquote(trimmed) {
        return false;
    }

    let pipes = pipe_offsets(trimmed);
    match pipes.as_slice() {
        [] => false,
        [only] => *only > 0 && *only < trimmed.len() - 1,
        _ => true,
    }
}

/// For each line, whether it sits inside a fenced code block. Fence
/// delimiter lines themselves are reported as fenced.
fn fenced_lines<S: AsRef<str>>(lines: &[S]) -> Vec<bool> {
    let mut open: Option<char> = None;
    lines
        .iter()
        .map(|line| match (open, fence_marker(line.as_ref())) {
            (None, Some(marker)) => {
                open = Some(marker);
                true
            }
            (Some(current), Some(marker)) if current == marker => {
                open = None;
                true
            }
            (state, _) => state.is_some(),
        })
        .collect()
}

/// Find the table region containing `cursor_line` (1-based).
///
/// Returns `None` when the cursor line is not table-like, is out of range,
/// or lies inside a fenced code block.
pub fn locate<S: AsRef<str>>(lines: &[S], cursor_line: usize) -> Option<TableRegion> {
    if cursor_line == 0 || cursor_line > lines.len() {
        return None;
    }
    let line_at = |n: usize| lines[n - 1].as_ref();

    if !is_table_like(line_at(cursor_line)) {
        return None;
    }
    if fenced_lines(&lines[..cursor_line])[cursor_line - 1] {
        return None;
    }

    let mut start_line = cursor_line;
    while start_line > 1 && is_table_like(line_at(start_line - 1)) {
        start_line -= 1;
    }

    let mut end_line = cursor_line;
    while end_line < lines.len() && is_table_like(line_at(end_line + 1)) {
        end_line += 1;
    }

    Some(TableRegion {
        start_line,
        end_line,
    })
}

/// Every table region of a document, in order, skipping fenced code.
pub fn find_tables<S: AsRef<str>>(lines: &[S]) -> Vec<TableRegion> {
    let fenced = fenced_lines(lines);
    let mut regions = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if fenced[i] || !is_table_like(lines[i].as_ref()) {
            i += 1;
            continue;
        }

        let start = i;
        let mut end = i + 1;
        while end < lines.len() && !fenced[end] && is_table_like(lines[end].as_ref()) {
            end += 1;
        }

        regions.push(TableRegion {
            start_line: start + 1,
            end_line: end,
        });
        i = end;
    }

    regions
}

/// Byte offsets of line starts, for converting between document offsets
/// and (line, column) positions. Lines are split on `\n` only.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self {
            starts,
            len: text.len(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// 1-based line number and byte column of `offset` (clamped to the text).
    pub fn position(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.len);
        let line = self.starts.partition_point(|&s| s <= offset);
        (line, offset - self.starts[line - 1])
    }

    /// Byte offset of the start of 1-based `line`.
    pub fn line_start(&self, line: usize) -> usize {
        self.starts[line - 1]
    }

    /// Byte offset of the end of 1-based `line`, excluding its newline.
    pub fn line_end(&self, line: usize) -> usize {
        self.starts
            .get(line)
            .map_or(self.len, |next_start| next_start - 1)
    }

    /// Document byte range covered by `region`, without the final newline.
    pub fn span(&self, region: &TableRegion) -> Range<usize> {
        self.line_start(region.start_line)..self.line_end(region.end_line)
    }

    /// Byte offset of a 1-based line and byte column, if it exists.
    pub fn offset(&self, line: usize, column: usize) -> Option<usize> {
        if line == 0 || line > self.starts.len() {
            return None;
        }
        let start = self.line_start(line);
        let end = self.line_end(line);
        (start + column <= end).then_some(start + column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<&str> {
        text.split('\n').collect()
    }

    #[test]
    fn test_is_table_like_rows() {
        assert!(is_table_like("| a | b |"));
        assert!(is_table_like("a | b"));
        assert!(is_table_like("| a |"));
        assert!(is_table_like("|---|---|"));
    }

    #[test]
    fn test_is_table_like_negative() {
        assert!(!is_table_like(""));
        assert!(!is_table_like("plain text"));
        assert!(!is_table_like("|"));
        assert!(!is_table_like("| a"));
        assert!(!is_table_like(r"a \| b"));
        assert!(!is_table_like("`a | b`"));
    }

    #[test]
    fn test_is_table_like_excludes_fences_and_quotes() {
        assert!(!is_table_like("```| a | b |"));
        assert!(!is_table_like("~~~ | x |"));
        assert!(!is_table_like("> | a | b |"));
        assert!(!is_table_like("   > a | b"));
    }

    #[test]
    fn test_locate_expands_both_ways() {
        let doc = lines("intro\n| a | b |\n|---|---|\n| 1 | 2 |\noutro");
        let region = locate(&doc, 3).unwrap();
        assert_eq!(region.start_line, 2);
        assert_eq!(region.end_line, 4);
        assert_eq!(region.line_count(), 3);
    }

    #[test]
    fn test_locate_at_document_edges() {
        let doc = lines("| a | b |\n|---|---|");
        let region = locate(&doc, 1).unwrap();
        assert_eq!((region.start_line, region.end_line), (1, 2));
    }

    #[test]
    fn test_locate_outside_table() {
        let doc = lines("intro\n| a | b |\n\ntext");
        assert!(locate(&doc, 1).is_none());
        assert!(locate(&doc, 3).is_none());
        assert!(locate(&doc, 0).is_none());
        assert!(locate(&doc, 9).is_none());
    }

    #[test]
    fn test_locate_stops_at_blockquote() {
        let doc = lines("> | q | r |\n| a | b |\n|---|---|");
        let region = locate(&doc, 2).unwrap();
        assert_eq!(region.start_line, 2);
    }

    #[test]
    fn test_locate_inside_fence_is_none() {
        let doc = lines("```\n| a | b |\n|---|---|\n```\n| c | d |");
        assert!(locate(&doc, 2).is_none());
        assert!(locate(&doc, 3).is_none());
        let region = locate(&doc, 5).unwrap();
        assert_eq!((region.start_line, region.end_line), (5, 5));
    }

    #[test]
    fn test_locate_mismatched_fence_marker_stays_open() {
        let doc = lines("~~~\n```\n| a | b |\n~~~\n| c | d |");
        assert!(locate(&doc, 3).is_none());
        assert!(locate(&doc, 5).is_some());
    }

    #[test]
    fn test_find_tables_multiple() {
        let doc = lines("| a | b |\n|---|---|\n\ntext\n| c | d |\n|---|---|\n| 1 | 2 |");
        let regions = find_tables(&doc);
        assert_eq!(regions.len(), 2);
        assert_eq!((regions[0].start_line, regions[0].end_line), (1, 2));
        assert_eq!((regions[1].start_line, regions[1].end_line), (5, 7));
    }

    #[test]
    fn test_find_tables_skips_fenced_code() {
        let doc = lines("```md\n| a | b |\n|---|---|\n```");
        assert!(find_tables(&doc).is_empty());
    }

    #[test]
    fn test_region_row_and_slice() {
        let doc = lines("x\n| a | b |\n|---|---|");
        let region = TableRegion {
            start_line: 2,
            end_line: 3,
        };
        assert_eq!(region.row_of(3), Some(1));
        assert_eq!(region.row_of(1), None);
        assert_eq!(region.slice(&doc), vec!["| a | b |", "|---|---|"]);
    }

    #[test]
    fn test_line_index_position() {
        let index = LineIndex::new("ab\ncd\n");
        assert_eq!(index.line_count(), 3);
        assert_eq!(index.position(0), (1, 0));
        assert_eq!(index.position(2), (1, 2));
        assert_eq!(index.position(3), (2, 0));
        assert_eq!(index.position(6), (3, 0));
        assert_eq!(index.position(99), (3, 0));
    }

    #[test]
    fn test_line_index_span_and_offset() {
        let text = "intro\n| a |\n| b |\nend";
        let index = LineIndex::new(text);
        let region = TableRegion {
            start_line: 2,
            end_line: 3,
        };
        let span = index.span(&region);
        assert_eq!(&text[span], "| a |\n| b |");
        assert_eq!(index.offset(2, 2), Some(8));
        assert_eq!(index.offset(2, 6), None);
        assert_eq!(index.offset(5, 0), None);
    }
}
