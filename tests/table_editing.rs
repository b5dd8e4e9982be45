//! Behavioral properties of the table engine, exercised through the public
//! library API.
//!
//! Run with: cargo test --test table_editing

use mdtable::format::{display_width, is_alignment_line, parse_alignment};
use mdtable::{
    Alignment, Buffer, ColumnPlacement, Direction, EditKind, Operation, Outcome, TableEditor,
    TextHost, format_table, is_formatted, tokenize,
};

const FORMATTED: &str = "| a   | b   |\n| --- | --- |\n| 1   | 2   |";

fn lines(text: &str) -> Vec<String> {
    text.lines().map(String::from).collect()
}

fn texts(line: &str) -> Vec<String> {
    tokenize(line).iter().map(|c| c.text().to_string()).collect()
}

// ============================================================================
// Formatting
// ============================================================================

#[test]
fn test_format_is_idempotent() {
    let tables = [
        "|a|b|\n|---|---|\n|1|2|",
        "|Name|Qty|\n|:---|---:|\n|apple|3|\n|kiwi|12|",
        "|x|y|z|\n|:---:|---|---:|\n|wide cell here|1|\n|2|3|4|5|",
        "  |indented|t|\n  |---|---|\n  |r|s|",
        "|名前|emoji 🎉|\n|---|:---:|\n|a|b|",
        "|a \\| b|`c | d`|\n|---|---|\n|1|2|",
    ];

    for table in tables {
        let once = format_table(&lines(table));
        let twice = format_table(&once);
        assert_eq!(once, twice, "formatting is not stable for {table:?}");
        assert!(is_formatted(&once));
    }
}

#[test]
fn test_tokenizer_escapes_and_code_spans() {
    assert_eq!(texts(r"| a \| b | c |"), vec![r"a \| b", "c"]);
    assert_eq!(texts("| `x | y` | z |"), vec!["`x | y`", "z"]);
    assert_eq!(texts("a | b"), texts("| a | b |"));
}

#[test]
fn test_formatted_rows_share_one_width() {
    let table = lines("|Name|Qty|\n|:---:|---|\n|日本語|1|\n|b|22222|");
    let formatted = format_table(&table);

    let width = display_width(&formatted[0]);
    for line in &formatted {
        assert_eq!(display_width(line), width, "ragged line {line:?}");
    }
}

#[test]
fn test_alignment_markers_survive_formatting() {
    let table = lines("|a|b|c|d|\n|:---|:---:|---:|---|\n|1|2|3|4|");
    let formatted = format_table(&table);

    assert!(is_alignment_line(&formatted[1]));
    let markers: Vec<_> = tokenize(&formatted[1])
        .iter()
        .map(|c| parse_alignment(c.text()))
        .collect();
    assert_eq!(
        markers,
        vec![
            Some(Alignment::Left),
            Some(Alignment::Center),
            Some(Alignment::Right),
            None
        ]
    );
}

#[test]
fn test_format_on_formatted_table_is_noop() {
    let editor = TableEditor::default();
    let mut buffer = Buffer::new(FORMATTED, 2);

    assert!(editor.format_table(&mut buffer));
    assert_eq!(buffer.text(), FORMATTED);
    assert_eq!(buffer.undo_depth(), 0);
    assert_eq!(
        editor.request(FORMATTED, 2, Operation::Format),
        Outcome::Handled(None)
    );
}

// ============================================================================
// Structural edits
// ============================================================================

#[test]
fn test_enter_after_header_creates_skeleton() {
    let editor = TableEditor::default();
    let mut buffer = Buffer::new("|a|b|", 5);

    assert!(editor.handle_enter(&mut buffer));
    assert_eq!(
        buffer.text(),
        "| a   | b   |\n| --- | --- |\n|     |     |"
    );
    assert_eq!(buffer.cursor(), 30);
    assert_eq!(buffer.last_kind(), Some(EditKind::TableStructure));
}

#[test]
fn test_tab_on_lone_header_creates_skeleton() {
    let editor = TableEditor::default();
    let mut buffer = Buffer::new("|a|b|", 1);

    assert!(editor.move_cell(&mut buffer, Direction::Next));
    assert_eq!(
        buffer.text(),
        "| a   | b   |\n| --- | --- |\n|     |     |"
    );
    assert_eq!(buffer.cursor(), 30);
}

#[test]
fn test_tab_in_last_cell_appends_row() {
    let editor = TableEditor::default();
    let mut buffer = Buffer::new(FORMATTED, 36);

    assert!(editor.move_cell(&mut buffer, Direction::Next));
    assert_eq!(buffer.text(), format!("{FORMATTED}\n|     |     |"));
    assert_eq!(buffer.cursor(), 44);
    assert_eq!(buffer.last_kind(), Some(EditKind::TableStructure));

    assert!(buffer.undo());
    assert_eq!(buffer.text(), FORMATTED);
    assert_eq!(buffer.cursor(), 36);
}

#[test]
fn test_insert_column_grows_header() {
    let editor = TableEditor::default();
    let mut buffer = Buffer::new(FORMATTED, 2);

    assert!(editor.insert_column(&mut buffer, ColumnPlacement::After));
    assert_eq!(
        buffer.text(),
        "| a   |     | b   |\n| --- | --- | --- |\n| 1   |     | 2   |"
    );
    let header = buffer.text().lines().next().unwrap_or_default();
    assert_eq!(tokenize(header).len(), 3);
    assert_eq!(buffer.cursor(), 48);
}

#[test]
fn test_align_column_touches_only_alignment_row() {
    let text = "|a|b|\n|---|---|\n|1|2|";
    let editor = TableEditor::default();
    let mut buffer = Buffer::new(text, 3);

    assert!(editor.align_column(&mut buffer, Alignment::Right));
    let before = lines(text);
    let after = lines(buffer.text());
    assert_eq!(after[0], before[0]);
    assert_eq!(after[1], "|---|---:|");
    assert_eq!(after[2], before[2]);
    assert_eq!(buffer.cursor(), 3);
}

#[test]
fn test_operations_outside_tables_are_declined() {
    let editor = TableEditor::default();
    let text = "Just a paragraph.\n\n|a|b|\n|---|---|";

    for op in [
        Operation::MoveCell(Direction::Next),
        Operation::Enter,
        Operation::Format,
        Operation::AlignColumn(Alignment::Center),
    ] {
        assert_eq!(editor.request(text, 3, op), Outcome::NotHandled, "{op:?}");
    }
}
