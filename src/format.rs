//! Canonical table formatting.
//!
//! ```text
//! | Name | Qty |          | Name  | Qty   |
//! |---|:---:|       →     | ----- | :---: |
//! | apple | 3 |           | apple |   3   |
//! ```
//!
//! Widths are display widths (CJK and emoji count as two columns), so the
//! padded table lines up in a monospace editor.

use std::sync::LazyLock;

use regex::Regex;
use unicode_width::UnicodeWidthStr;

use crate::tokenizer::{Cell, tokenize};

/// Minimum number of dashes in an alignment cell.
pub const MIN_DASHES: usize = 3;

static ALIGNMENT_CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:?-{3,}:?$").expect("valid alignment cell pattern"));

/// Horizontal alignment of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
}

impl Alignment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }

    /// Wrap `dashes` dashes in this alignment's colons.
    pub fn marker(self, dashes: usize) -> String {
        let dashes = "-".repeat(dashes);
        match self {
            Self::Left => format!(":{dashes}"),
            Self::Right => format!("{dashes}:"),
            Self::Center => format!(":{dashes}:"),
        }
    }
}

/// Alignment encoded by an alignment-row cell.
///
/// `None` means bare dashes: no explicit marker, laid out as left.
pub fn parse_alignment(cell: &str) -> Option<Alignment> {
    let cell = cell.trim();
    match (cell.starts_with(':'), cell.ends_with(':') && cell.len() > 1) {
        (true, true) => Some(Alignment::Center),
        (true, false) => Some(Alignment::Left),
        (false, true) => Some(Alignment::Right),
        (false, false) => None,
    }
}

pub fn is_alignment_cell(cell: &str) -> bool {
    ALIGNMENT_CELL.is_match(cell.trim())
}

/// True if every cell is a dash/colon marker or empty, and at least one is
/// a marker.
pub fn is_alignment_row(cells: &[Cell]) -> bool {
    cells.iter().any(|c| is_alignment_cell(c.text()))
        && cells
            .iter()
            .all(|c| c.is_blank() || is_alignment_cell(c.text()))
}

pub fn is_alignment_line(line: &str) -> bool {
    is_alignment_row(&tokenize(line))
}

pub fn display_width(text: &str) -> usize {
    UnicodeWidthStr::width(text)
}

/// Narrowest column that still shows three dashes next to its colons.
fn minimum_width(marker: Option<Alignment>) -> usize {
    match marker {
        None => MIN_DASHES,
        Some(Alignment::Left | Alignment::Right) => MIN_DASHES + 1,
        Some(Alignment::Center) => MIN_DASHES + 2,
    }
}

/// Per-column widths over header and data rows (the alignment row does not
/// contribute).
pub fn column_widths(
    header: &[Cell],
    rows: &[Vec<Cell>],
    markers: &[Option<Alignment>],
) -> Vec<usize> {
    markers
        .iter()
        .enumerate()
        .map(|(column, &marker)| {
            std::iter::once(header)
                .chain(rows.iter().map(Vec::as_slice))
                .filter_map(|row| row.get(column))
                .map(|cell| display_width(cell.text()))
                .fold(minimum_width(marker), usize::max)
        })
        .collect()
}

/// Pad `text` to `width` display columns.
///
/// Centered text gets floor(extra / 2) spaces on the left and the rest on
/// the right.
pub fn pad_cell(text: &str, width: usize, alignment: Alignment) -> String {
    let extra = width.saturating_sub(display_width(text));
    let (left, right) = match alignment {
        Alignment::Left => (0, extra),
        Alignment::Right => (extra, 0),
        Alignment::Center => (extra / 2, extra - extra / 2),
    };
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(right))
}

/// Alignment-row cell of exactly `width` characters.
pub fn alignment_cell(width: usize, marker: Option<Alignment>) -> String {
    match marker {
        None => "-".repeat(width),
        Some(alignment) => {
            let colons = if alignment == Alignment::Center { 2 } else { 1 };
            alignment.marker(width.saturating_sub(colons))
        }
    }
}

fn render_row(indent: &str, cells: &[String]) -> String {
    format!("{indent}| {} |", cells.join(" | "))
}

/// Reformat a table's lines.
///
/// Returns the input unchanged when it is not a complete table: fewer than
/// two lines, a header with fewer than two cells, or no alignment row on
/// line two. The header line's indentation is applied to every line.
pub fn format_table<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    let unchanged = || lines.iter().map(|l| l.as_ref().to_string()).collect();
    if lines.len() < 2 {
        return unchanged();
    }

    let header = tokenize(lines[0].as_ref());
    let separator = tokenize(lines[1].as_ref());
    if header.len() < 2 || !is_alignment_row(&separator) {
        return unchanged();
    }

    let rows: Vec<Vec<Cell>> = lines[2..].iter().map(|l| tokenize(l.as_ref())).collect();
    // Ragged rows widen the table rather than losing cells.
    let columns = rows.iter().map(Vec::len).fold(header.len(), usize::max);

    let markers: Vec<Option<Alignment>> = (0..columns)
        .map(|i| separator.get(i).and_then(|c| parse_alignment(c.text())))
        .collect();
    let widths = column_widths(&header, &rows, &markers);

    let first = lines[0].as_ref();
    let indent = &first[..first.len() - first.trim_start().len()];
    let cell_text = |row: &[Cell], i: usize| row.get(i).map_or("", |c| c.text()).to_string();

    let mut out = Vec::with_capacity(lines.len());
    out.push(render_row(
        indent,
        &(0..columns)
            .map(|i| pad_cell(&cell_text(&header, i), widths[i], Alignment::Left))
            .collect::<Vec<_>>(),
    ));
    out.push(render_row(
        indent,
        &(0..columns)
            .map(|i| alignment_cell(widths[i], markers[i]))
            .collect::<Vec<_>>(),
    ));
    for row in &rows {
        out.push(render_row(
            indent,
            &(0..columns)
                .map(|i| {
                    let alignment = markers[i].unwrap_or(Alignment::Left);
                    pad_cell(&cell_text(row, i), widths[i], alignment)
                })
                .collect::<Vec<_>>(),
        ));
    }

    out
}

/// True if formatting would not change these lines.
pub fn is_formatted<S: AsRef<str>>(lines: &[S]) -> bool {
    format_table(lines)
        .iter()
        .zip(lines)
        .all(|(formatted, original)| formatted == original.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(text: &str) -> Vec<String> {
        format_table(&text.lines().collect::<Vec<_>>())
    }

    #[test]
    fn test_parse_alignment() {
        assert_eq!(parse_alignment(":---"), Some(Alignment::Left));
        assert_eq!(parse_alignment("---:"), Some(Alignment::Right));
        assert_eq!(parse_alignment(" :---: "), Some(Alignment::Center));
        assert_eq!(parse_alignment("---"), None);
        assert_eq!(parse_alignment(":"), Some(Alignment::Left));
    }

    #[test]
    fn test_is_alignment_cell() {
        assert!(is_alignment_cell("---"));
        assert!(is_alignment_cell(" :----: "));
        assert!(!is_alignment_cell("--"));
        assert!(!is_alignment_cell(":-:"));
        assert!(!is_alignment_cell("a--"));
    }

    #[test]
    fn test_is_alignment_row_allows_blank_cells() {
        assert!(is_alignment_line("| --- | |"));
        assert!(!is_alignment_line("| | |"));
        assert!(!is_alignment_line("| --- | x |"));
    }

    #[test]
    fn test_pad_cell() {
        assert_eq!(pad_cell("ab", 5, Alignment::Left), "ab   ");
        assert_eq!(pad_cell("ab", 5, Alignment::Right), "   ab");
        assert_eq!(pad_cell("ab", 5, Alignment::Center), " ab  ");
        assert_eq!(pad_cell("abcdef", 3, Alignment::Left), "abcdef");
    }

    #[test]
    fn test_alignment_cell() {
        assert_eq!(alignment_cell(3, None), "---");
        assert_eq!(alignment_cell(5, Some(Alignment::Left)), ":----");
        assert_eq!(alignment_cell(5, Some(Alignment::Right)), "----:");
        assert_eq!(alignment_cell(5, Some(Alignment::Center)), ":---:");
    }

    #[test]
    fn test_format_simple_table() {
        let out = format("| Name | Qty |\n|---|:---:|\n| apple | 3 |\n| kiwi | 12 |");
        assert_eq!(
            out,
            vec![
                "| Name  | Qty   |",
                "| ----- | :---: |",
                "| apple |   3   |",
                "| kiwi  |  12   |",
            ]
        );
    }

    #[test]
    fn test_format_is_idempotent() {
        let once = format("|a|b|c|\n|:---|---:|---|\n|1|22|333|\n|`x|y`|\\||z|");
        assert_eq!(once[1], "| :---- | ---: | --- |");
        let twice = format_table(&once);
        assert_eq!(once, twice);
        assert!(is_formatted(&once));
    }

    #[test]
    fn test_format_header_always_left() {
        let out = format("| H | I |\n| ---: | :---: |\n| long value | x |");
        assert_eq!(out[0], "| H          | I     |");
        assert_eq!(out[2], "| long value |   x   |");
    }

    #[test]
    fn test_format_width_invariant() {
        let out = format("| a | bb |\n|---|---|\n| cccc | d |\n| e |");
        let pipe_counts: Vec<usize> = out.iter().map(|l| l.matches('|').count()).collect();
        assert!(pipe_counts.iter().all(|&n| n == 3));
        for line in &out {
            let cells = tokenize(line);
            assert_eq!(display_width(cells[0].raw()), 4 + 2);
            assert_eq!(display_width(cells[1].raw()), 3 + 2);
        }
    }

    #[test]
    fn test_format_alignment_round_trip() {
        let out = format("| A | B | C |\n| :--- | ---: | :---: |\n| 1 | 2 | 3 |");
        let markers: Vec<_> = tokenize(&out[1])
            .iter()
            .map(|c| parse_alignment(c.text()))
            .collect();
        assert_eq!(
            markers,
            vec![
                Some(Alignment::Left),
                Some(Alignment::Right),
                Some(Alignment::Center)
            ]
        );
        assert_eq!(out[1], "| :--- | ---: | :---: |");
    }

    #[test]
    fn test_format_noop_cases() {
        assert_eq!(format("| a | b |"), vec!["| a | b |"]);
        assert_eq!(format("| a |\n|---|"), vec!["| a |", "|---|"]);
        assert_eq!(format("| a | b |\n| c | d |"), vec!["| a | b |", "| c | d |"]);
    }

    #[test]
    fn test_format_keeps_escaped_pipes() {
        let out = format(r"| a | b |
|---|---|
| x \| y | z |");
        assert_eq!(out[2], r"| x \| y | z   |");
    }

    #[test]
    fn test_format_escaped_backslash_keeps_column_count() {
        let out = format_table(&[r"| a | b \\|", "|---|---|"]);
        assert_eq!(out, vec![r"| a   | b \\ |", "| --- | ---- |"]);
    }

    #[test]
    fn test_format_ragged_rows_widen_table() {
        let out = format("| a | b |\n|---|---|\n| 1 | 2 | 3 |");
        assert_eq!(out[0], "| a   | b   |     |");
        assert_eq!(out[1], "| --- | --- | --- |");
        assert_eq!(out[2], "| 1   | 2   | 3   |");
    }

    #[test]
    fn test_format_keeps_indentation() {
        let out = format("  | a | b |\n  |---|---|");
        assert_eq!(out, vec!["  | a   | b   |", "  | --- | --- |"]);
    }

    #[test]
    fn test_format_wide_characters() {
        let out = format("| 名前 | x |\n|---|---|\n| a | b |");
        assert_eq!(out[0], "| 名前 | x   |");
        assert_eq!(out[2], "| a    | b   |");
    }
}
