//! Splitting table lines into cells.
//!
//! A `|` is a column separator only when it is not escaped with a backslash
//! and not inside a backtick code span. Everything here works on byte
//! offsets into the original line.

/// One cell of a table row.
///
/// The raw text keeps the padding found between the separators; [`Cell::text`]
/// is the trimmed value used for width computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    raw: String,
}

impl Cell {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// Untrimmed cell content.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Trimmed cell content.
    pub fn text(&self) -> &str {
        self.raw.trim()
    }

    pub fn is_blank(&self) -> bool {
        self.text().is_empty()
    }
}

/// Scan state shared by the tokenizer and the pipe locator.
#[derive(Default)]
struct Scanner {
    escaped: bool,
    in_code: bool,
}

impl Scanner {
    /// Feed one character; returns true if it is a column separator.
    fn is_separator(&mut self, c: char) -> bool {
        if self.escaped {
            self.escaped = false;
            return false;
        }
        match c {
            '\\' => {
                self.escaped = true;
                false
            }
            '`' => {
                self.in_code = !self.in_code;
                false
            }
            '|' => !self.in_code,
            _ => false,
        }
    }
}

/// Byte offsets of every separator pipe in `line`.
pub fn pipe_offsets(line: &str) -> Vec<usize> {
    let mut scanner = Scanner::default();
    line.char_indices()
        .filter(|&(_, c)| scanner.is_separator(c))
        .map(|(i, _)| i)
        .collect()
}

/// Ends with a `|` that the scanner treats as a separator.
fn ends_with_separator(s: &str) -> bool {
    pipe_offsets(s).last().is_some_and(|&offset| offset + 1 == s.len())
}

/// True if the first non-blank character of the line is a `|`.
pub fn has_leading_pipe(line: &str) -> bool {
    line.trim_start().starts_with('|')
}

/// Split one line into its raw cells.
///
/// Missing outer pipes are added first, so `a|b` and `|a|b|` yield the same
/// cells. An empty line yields a single empty cell.
pub fn tokenize(line: &str) -> Vec<Cell> {
    let trimmed = line.trim();
    let mut normalized = String::with_capacity(trimmed.len() + 2);
    if !trimmed.starts_with('|') {
        normalized.push('|');
    }
    normalized.push_str(trimmed);
    if !ends_with_separator(&normalized) || normalized.len() == 1 {
        normalized.push('|');
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut scanner = Scanner::default();
    for c in normalized.chars() {
        if scanner.is_separator(c) {
            segments.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    segments.push(current);

    // Drop what precedes the leading pipe, and the empty tail after the
    // closing pipe. An unterminated code span swallows the closing pipe, in
    // which case the tail holds real content and stays.
    let mut cells: Vec<Cell> = segments.into_iter().skip(1).map(Cell::new).collect();
    if cells.len() > 1 && cells.last().is_some_and(|c| c.raw.is_empty()) {
        cells.pop();
    }
    cells
}

/// Index of the cell containing byte column `col` of `line`.
///
/// Counts separator pipes before the cursor; the leading pipe of a row does
/// not open a new column. The result is not clamped to the cell count.
pub fn column_at(line: &str, col: usize) -> usize {
    let before = pipe_offsets(line).iter().filter(|&&p| p < col).count();
    if has_leading_pipe(line) {
        before.saturating_sub(1)
    } else {
        before
    }
}

/// Byte offset where the content of cell `column` begins.
///
/// That is just after the pipe opening the cell and the single space that
/// follows it, or right after the pipe when no space is present. A column
/// past the end of the row maps to the end of the line.
pub fn cell_anchor(line: &str, column: usize) -> usize {
    let pipes = pipe_offsets(line);
    let opening = if has_leading_pipe(line) {
        pipes.get(column).copied()
    } else if column == 0 {
        return line.len() - line.trim_start().len();
    } else {
        pipes.get(column - 1).copied()
    };

    match opening {
        Some(pipe) => {
            let after = pipe + 1;
            if line[after..].starts_with(' ') {
                after + 1
            } else {
                after
            }
        }
        None => line.len(),
    }
}

/// Locate `col` as (cell index, offset into the trimmed cell text).
pub fn position_in_cell(line: &str, col: usize) -> (usize, usize) {
    let column = column_at(line, col);
    let start = content_start(line, column);
    let offset = col.saturating_sub(start);
    let text_len = tokenize(line).get(column).map_or(0, |c| c.text().len());
    (column, offset.min(text_len))
}

/// Byte offset of the first non-blank character of cell `column`, or the
/// anchor when the cell is blank.
pub fn content_start(line: &str, column: usize) -> usize {
    let anchor = cell_anchor(line, column);
    let rest = &line[anchor..];
    let skipped = rest.len() - rest.trim_start_matches(' ').len();
    let candidate = anchor + skipped;
    match line[candidate..].chars().next() {
        Some('|') | None => anchor,
        Some(_) => candidate,
    }
}

/// Byte offset of `offset` bytes into the text of cell `column`, clamped to
/// the cell text and snapped back to a character boundary.
pub fn offset_in_cell(line: &str, column: usize, offset: usize) -> usize {
    let start = content_start(line, column);
    let text_len = tokenize(line).get(column).map_or(0, |c| c.text().len());
    let mut pos = (start + offset.min(text_len)).min(line.len());
    while !line.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}
