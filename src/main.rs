//! # Markdown Table Formatter (mdtable)
//!
//! A CLI front end for the `mdtable` table editing engine.
//!
//! ## Overview
//!
//! By default `mdtable` finds every pipe table in the input and rewrites it
//! into canonical form: every column padded to its widest cell, alignment
//! markers rebuilt, one space on either side of each cell. Text outside
//! tables (and tables inside fenced code) is left untouched.
//!
//! The `edit` subcommand runs a single structural operation (cell
//! navigation, row/column insertion, alignment, Enter, format) at a given
//! cursor position, the same way an editor integration would.
//!
//! ## Algorithm Flow
//!
//! ```text
//! Input → Table Detection → Line Range Filter → Format Each Table → Output
//! ```
//!
//! ## Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Success |
//! | 1 | General error (file not found, permission denied, I/O error) |
//! | 2 | Invalid command-line arguments |
//! | 3 | Dry-run mode: changes would be made |
//! | 4 | Parse error (invalid UTF-8 or binary input) |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use anyhow::{Context, Result};
use clap::ValueEnum;
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use mdtable::format::{format_table, is_alignment_line};
use mdtable::region::{LineIndex, TableRegion, find_tables};
use mdtable::tokenizer::tokenize;
use mdtable::{
    Alignment, Buffer, ColumnPlacement, Direction, EditKind, EditorConfig, Operation,
    RowPlacement, TableEditor, TextHost,
};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use rich_rust::terminal;
use rich_rust::{ColorSystem, Console};
use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};
use std::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};
use tracing::debug;
use tracing_subscriber::EnvFilter;

// ─────────────────────────────────────────────────────────────────────────────
// Exit Codes
// ─────────────────────────────────────────────────────────────────────────────

/// Semantic exit codes for scripting and CI integration
mod exit_codes {
    /// Success - completed without errors
    pub const SUCCESS: i32 = 0;
    /// General error (file not found, permission denied, I/O error)
    pub const ERROR: i32 = 1;
    /// Invalid command-line arguments
    pub const INVALID_ARGS: i32 = 2;
    /// Dry-run mode: changes would be made
    pub const WOULD_CHANGE: i32 = 3;
    /// Parse error (invalid UTF-8 or binary file detected)
    pub const PARSE_ERROR: i32 = 4;
}

#[derive(Debug)]
struct ArgError(String);

impl fmt::Display for ArgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ArgError {}

#[derive(Debug)]
struct ParseError(String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug)]
struct RunOutcome {
    dry_run: bool,
    would_change: bool,
}

fn error_chain_has<T: std::error::Error + 'static>(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<T>())
}

fn exit_code_for_error(err: &anyhow::Error) -> i32 {
    if error_chain_has::<ArgError>(err) {
        exit_codes::INVALID_ARGS
    } else if error_chain_has::<ParseError>(err) {
        exit_codes::PARSE_ERROR
    } else {
        exit_codes::ERROR
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Line Range Processing
// ─────────────────────────────────────────────────────────────────────────────

/// A range of lines to process (1-indexed, inclusive on both ends)
#[derive(Debug, Clone, PartialEq, Eq)]
struct LineRange {
    /// Start line (1-indexed, inclusive)
    start: usize,
    /// End line (1-indexed, inclusive, usize::MAX means "to end of file")
    end: usize,
}

/// Parse a single range specification like "10-50", "50-", "-100", or "42"
fn parse_single_range(s: &str) -> Result<LineRange, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Empty range specification".to_string());
    }

    let Some((start_str, end_str)) = s.split_once('-') else {
        let line = s
            .parse::<usize>()
            .map_err(|_| format!("Invalid line number: '{}'", s))?;
        if line == 0 {
            return Err("Line numbers start at 1, not 0".to_string());
        }
        return Ok(LineRange {
            start: line,
            end: line,
        });
    };

    // "-100" means "1-100", "50-" means "50 to end"
    let start = if start_str.is_empty() {
        1
    } else {
        start_str
            .parse::<usize>()
            .map_err(|_| format!("Invalid start line: '{}'", start_str))?
    };
    let end = if end_str.is_empty() {
        usize::MAX
    } else {
        end_str
            .parse::<usize>()
            .map_err(|_| format!("Invalid end line: '{}'", end_str))?
    };

    if start == 0 {
        return Err("Line numbers start at 1, not 0".to_string());
    }
    if start > end {
        return Err(format!("Invalid range: start ({}) > end ({})", start, end));
    }

    Ok(LineRange { start, end })
}

/// Merge overlapping or adjacent ranges
fn merge_ranges(mut ranges: Vec<LineRange>) -> Vec<LineRange> {
    ranges.sort_by_key(|r| r.start);

    let mut merged: Vec<LineRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(current) if range.start <= current.end.saturating_add(1) => {
                current.end = current.end.max(range.end);
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// Parse a line ranges specification like "10-50", "1-100,200-250", "50-"
fn parse_line_ranges(s: &str) -> Result<Vec<LineRange>, String> {
    let ranges = s
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_single_range)
        .collect::<Result<Vec<_>, _>>()?;

    if ranges.is_empty() {
        return Err("No valid ranges specified".to_string());
    }

    Ok(merge_ranges(ranges))
}

/// True if any line of the table falls inside one of the ranges
fn region_overlaps_ranges(region: &TableRegion, ranges: &[LineRange]) -> bool {
    ranges
        .iter()
        .any(|r| region.start_line <= r.end && region.end_line >= r.start)
}

/// Format line ranges for display
fn format_line_ranges(ranges: &[LineRange], total_lines: usize) -> String {
    let range_strs: Vec<String> = ranges
        .iter()
        .map(|r| {
            if r.end == usize::MAX {
                format!("{}-", r.start)
            } else if r.start == r.end {
                format!("{}", r.start)
            } else {
                format!("{}-{}", r.start, r.end)
            }
        })
        .collect();

    let covered: usize = ranges
        .iter()
        .map(|r| {
            let effective_end = r.end.min(total_lines);
            if r.start <= effective_end {
                effective_end - r.start + 1
            } else {
                0
            }
        })
        .sum();

    format!(
        "{} ({} of {} lines)",
        range_strs.join(", "),
        covered,
        total_lines
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// CLI Arguments
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ColorMode {
    /// Auto-detect color support
    Auto,
    /// Always emit colors (even when not a TTY)
    Always,
    /// Never emit colors
    Never,
}

/// Markdown table formatter: aligns pipe tables and edits them structurally
#[derive(Parser, Debug)]
#[command(
    name = "mdtable",
    version,
    about,
    long_about = None,
    after_help = "EXIT CODES:\n  0  Success\n  1  General error (file not found, permission denied, I/O error)\n  2  Invalid command-line arguments\n  3  Dry-run mode: changes would be made\n  4  Parse error (invalid UTF-8 or binary input)\n"
)]
struct Args {
    /// Input file(s). Reads from stdin if not provided.
    /// Multiple files can be specified.
    #[arg(value_name = "FILE")]
    inputs: Vec<PathBuf>,

    /// Path to config file (default: search for .mdtablerc)
    #[arg(long = "config", value_name = "FILE")]
    config_file: Option<PathBuf>,

    /// Ignore config files
    #[arg(long = "no-config")]
    no_config: bool,

    /// Process files recursively in directories
    #[arg(short = 'r', long)]
    recursive: bool,

    /// Glob pattern to match files when recursing (comma-separated)
    #[arg(long, default_value = DEFAULT_GLOB, requires = "recursive")]
    glob: String,

    /// Do not respect .gitignore when recursing
    #[arg(long = "no-gitignore", requires = "recursive")]
    no_gitignore: bool,

    /// Maximum directory depth (0 = unlimited)
    #[arg(long, default_value = "0", requires = "recursive")]
    max_depth: usize,

    /// Edit file(s) in place
    #[arg(short = 'i', long)]
    in_place: bool,

    /// Format only tables touching these line ranges (e.g., "10-50", "1-100,200-250", "50-", "-100")
    #[arg(short = 'L', long, value_name = "RANGES")]
    lines: Option<String>,

    /// Verbose output showing each table found
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Color output: auto, always, or never
    #[arg(long, value_enum, default_value = "auto")]
    color: ColorMode,

    /// Show unified diff of changes instead of full output
    #[arg(short = 'd', long)]
    diff: bool,

    /// Preview changes without modifying files (exit 0=no changes, 3=would change)
    #[arg(short = 'n', long, conflicts_with = "in_place")]
    dry_run: bool,

    /// Watch file for changes and reformat on save
    #[arg(short = 'w', long, conflicts_with_all = ["in_place", "recursive", "diff", "dry_run", "json"])]
    watch: bool,

    /// Debounce interval in milliseconds (for --watch mode)
    #[arg(long, default_value = "500", requires = "watch")]
    debounce_ms: u64,

    /// Create backup file before in-place editing
    #[arg(long, requires = "in_place")]
    backup: bool,

    /// Extension for backup files (default: .bak)
    #[arg(long, default_value = ".bak", requires = "backup")]
    backup_ext: String,

    /// Output results as JSON for programmatic processing
    #[arg(long, conflicts_with_all = ["verbose", "diff"])]
    json: bool,

    /// Emit engine diagnostics on stderr (filter with MDTABLE_LOG)
    #[arg(long)]
    debug: bool,

    /// Subcommand (structural edits, config management)
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Default patterns for recursive mode
const DEFAULT_GLOB: &str = "*.md,*.markdown";

// ─────────────────────────────────────────────────────────────────────────────
// Subcommands
// ─────────────────────────────────────────────────────────────────────────────

/// Available subcommands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one table operation at a cursor position
    Edit(EditArgs),
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config management actions
#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Initialize a new .mdtablerc config file
    Init {
        /// Create in home directory instead of current
        #[arg(long)]
        global: bool,
    },
    /// Show effective configuration (merged file + CLI)
    Show,
    /// Show path to active config file
    Path,
}

/// Table operations exposed by `mdtable edit`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EditOp {
    /// Move to the next cell (Tab)
    Next,
    /// Move to the previous cell (Shift-Tab)
    Prev,
    /// Insert an empty row above the cursor
    RowAbove,
    /// Insert an empty row below the cursor
    RowBelow,
    /// Insert an empty column before the cursor
    ColumnBefore,
    /// Insert an empty column after the cursor
    ColumnAfter,
    /// Left-align the cursor's column
    AlignLeft,
    /// Center the cursor's column
    AlignCenter,
    /// Right-align the cursor's column
    AlignRight,
    /// Press Enter at the end of a table line
    Enter,
    /// Reformat the table
    Format,
}

impl EditOp {
    fn operation(self) -> Operation {
        match self {
            Self::Next => Operation::MoveCell(Direction::Next),
            Self::Prev => Operation::MoveCell(Direction::Prev),
            Self::RowAbove => Operation::InsertRow(RowPlacement::Above),
            Self::RowBelow => Operation::InsertRow(RowPlacement::Below),
            Self::ColumnBefore => Operation::InsertColumn(ColumnPlacement::Before),
            Self::ColumnAfter => Operation::InsertColumn(ColumnPlacement::After),
            Self::AlignLeft => Operation::AlignColumn(Alignment::Left),
            Self::AlignCenter => Operation::AlignColumn(Alignment::Center),
            Self::AlignRight => Operation::AlignColumn(Alignment::Right),
            Self::Enter => Operation::Enter,
            Self::Format => Operation::Format,
        }
    }
}

#[derive(clap::Args, Debug)]
struct EditArgs {
    /// Operation to run
    #[arg(value_enum)]
    op: EditOp,

    /// Input file. Reads from stdin if not provided.
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Cursor line (1-indexed)
    #[arg(short = 'l', long)]
    line: usize,

    /// Cursor column in characters (1-indexed)
    #[arg(short = 'c', long, default_value = "1")]
    column: usize,

    /// Run the operation this many times, stopping early if it stops applying
    #[arg(long, default_value = "1")]
    repeat: usize,

    /// Write the result back to FILE
    #[arg(short = 'i', long, requires = "file")]
    in_place: bool,

    /// Output a JSON report instead of the document
    #[arg(long)]
    json: bool,

    /// Do not reformat the table when moving between cells
    #[arg(long)]
    no_auto_format: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration and Statistics
// ─────────────────────────────────────────────────────────────────────────────

/// Runtime configuration derived from CLI args
#[derive(Debug)]
struct Config {
    lines: Option<Vec<LineRange>>,
    recursive: bool,
    glob: String,
    gitignore: bool,
    max_depth: usize,
    color: ColorMode,
    verbose: bool,
    diff: bool,
    dry_run: bool,
    watch: bool,
    debounce_ms: u64,
    backup: bool,
    backup_ext: String,
    json: bool,
    editor: EditorConfig,
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        // Ranges are validated up front by validate_args
        let lines = args.lines.as_ref().and_then(|s| parse_line_ranges(s).ok());

        Self {
            lines,
            recursive: args.recursive,
            glob: args.glob.clone(),
            gitignore: !args.no_gitignore,
            max_depth: args.max_depth,
            color: args.color,
            verbose: args.verbose,
            diff: args.diff,
            dry_run: args.dry_run,
            watch: args.watch,
            debounce_ms: args.debounce_ms,
            backup: args.backup,
            backup_ext: args.backup_ext.clone(),
            json: args.json,
            editor: EditorConfig {
                debug: args.debug,
                ..EditorConfig::default()
            },
        }
    }
}

struct VerboseStyle {
    use_color: bool,
}

impl VerboseStyle {
    fn new(use_color: bool) -> Self {
        Self { use_color }
    }

    fn wrap(&self, tag: &str, text: impl fmt::Display) -> String {
        if self.use_color {
            format!("[{}]{}[/]", tag, text)
        } else {
            text.to_string()
        }
    }

    fn header(&self, text: impl fmt::Display) -> String {
        self.wrap("bold cyan", text)
    }

    fn table(&self, text: impl fmt::Display) -> String {
        self.wrap("yellow", text)
    }

    fn success(&self, text: impl fmt::Display) -> String {
        self.wrap("bold green", text)
    }

    fn dim(&self, text: impl fmt::Display) -> String {
        self.wrap("dim", text)
    }

    fn bold(&self, text: impl fmt::Display) -> String {
        self.wrap("bold", text)
    }

    fn stat_label(&self, text: impl fmt::Display) -> String {
        self.wrap("bold blue", text)
    }

    fn separator(&self) -> String {
        self.wrap("dim", "───")
    }
}

/// Print a statistics summary to stderr
fn print_stats_summary(
    stats: &Stats,
    files_processed: usize,
    files_changed: usize,
    errors: usize,
    console: &Console,
    styles: &VerboseStyle,
) {
    console.print("");
    console.print(&format!(
        "{} Summary {}",
        styles.separator(),
        styles.separator()
    ));

    if files_processed > 1 {
        console.print(&format!(
            "  {} {} processed, {} modified, {} unchanged",
            styles.stat_label("Files:"),
            files_processed,
            files_changed,
            files_processed.saturating_sub(files_changed)
        ));
    }

    console.print(&format!(
        "  {} {} found, {} formatted, {} skipped",
        styles.stat_label("Tables:"),
        stats.tables_found,
        stats.tables_modified,
        stats.tables_skipped
    ));

    console.print(&format!(
        "  {} {} rewritten",
        styles.stat_label("Rows:"),
        stats.rows_rewritten
    ));

    let elapsed_ms = stats.elapsed.as_secs_f64() * 1000.0;
    console.print(&format!(
        "  {} {:.2}ms ({:.0} lines/sec)",
        styles.stat_label("Time:"),
        elapsed_ms,
        stats.lines_per_second()
    ));

    if errors > 0 {
        console.print(&format!(
            "  {} {}",
            styles.wrap("bold red", "Errors:"),
            errors
        ));
    }

    console.print("");
}

fn build_console(color: ColorMode) -> (Console, VerboseStyle) {
    let forced = || {
        let system = terminal::detect_color_system().unwrap_or(ColorSystem::Standard);
        let console = Console::builder()
            .force_terminal(true)
            .color_system(system)
            .build();
        (console, VerboseStyle::new(true))
    };

    match color {
        ColorMode::Never => (Console::new(), VerboseStyle::new(false)),
        ColorMode::Always => forced(),
        ColorMode::Auto => {
            if std::env::var("NO_COLOR").is_ok() {
                return (Console::new(), VerboseStyle::new(false));
            }
            if std::env::var("FORCE_COLOR").is_ok() {
                return forced();
            }

            let console = Console::new();
            let use_color = console.is_color_enabled();
            (console, VerboseStyle::new(use_color))
        }
    }
}

/// Route `tracing` output to stderr. `MDTABLE_LOG` takes precedence over
/// `--debug`.
fn init_tracing(debug: bool) {
    let fallback = if debug { "mdtable=debug" } else { "mdtable=warn" };
    let filter =
        EnvFilter::try_from_env("MDTABLE_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

// ─────────────────────────────────────────────────────────────────────────────
// Config File Support
// ─────────────────────────────────────────────────────────────────────────────

/// Config file names searched in order
const CONFIG_FILENAMES: &[&str] = &[".mdtablerc", ".mdtablerc.toml", "mdtablerc.toml"];

/// Configuration loaded from a .mdtablerc file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    /// Show verbose output
    verbose: Option<bool>,
    /// Color mode: auto, always, never
    color: Option<ColorMode>,
    /// Output as JSON
    json: Option<bool>,
    /// Create backup before in-place edit
    backup: Option<bool>,
    /// Backup file extension
    backup_ext: Option<String>,
    /// Enable recursive mode
    recursive: Option<bool>,
    /// Glob patterns for recursive mode
    glob: Option<String>,
    /// Respect .gitignore
    gitignore: Option<bool>,
    /// Maximum directory depth
    max_depth: Option<usize>,
    /// `[editor]` table: engine settings
    editor: Option<EditorConfig>,
}

/// Search for a config file starting from the given directory
fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    let existing = |dir: &Path| {
        CONFIG_FILENAMES
            .iter()
            .map(|filename| dir.join(filename))
            .find(|path| path.exists())
    };

    let mut current = start_dir.to_path_buf();
    loop {
        if let Some(path) = existing(&current) {
            return Some(path);
        }
        if !current.pop() {
            break;
        }
    }

    dirs::home_dir().and_then(|home| existing(&home))
}

/// Load and parse a config file
fn load_config_file(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Directory the config search starts from for a given input
fn config_search_dir(input: Option<&PathBuf>) -> PathBuf {
    input
        .and_then(|p| {
            if p.is_dir() {
                Some(p.clone())
            } else {
                p.parent().map(|p| p.to_path_buf())
            }
        })
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default())
}

/// Config file in effect: `--config`, then the search, unless `--no-config`
fn resolve_config_path(args: &Args, start_dir: &Path) -> Result<Option<PathBuf>> {
    if args.no_config {
        return Ok(None);
    }

    if let Some(ref path) = args.config_file {
        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
        }
        return Ok(Some(path.clone()));
    }

    Ok(find_config_file(start_dir))
}

/// Create Config by merging file config with CLI args (CLI wins)
fn create_config(args: &Args) -> Result<Config> {
    let mut config = Config::from(args);

    let start_dir = config_search_dir(args.inputs.first());
    let Some(path) = resolve_config_path(args, &start_dir)? else {
        return Ok(config);
    };
    let file_config = load_config_file(&path)?;

    // Only apply file config values when the CLI used its defaults
    if !args.verbose {
        if let Some(v) = file_config.verbose {
            config.verbose = v;
        }
    }

    if args.color == ColorMode::Auto {
        if let Some(c) = file_config.color {
            config.color = c;
        }
    }

    if !args.json {
        if let Some(j) = file_config.json {
            config.json = j;
        }
    }

    if !args.backup {
        if let Some(b) = file_config.backup {
            config.backup = b;
        }
    }

    if args.backup_ext == ".bak" {
        if let Some(ext) = file_config.backup_ext {
            config.backup_ext = ext;
        }
    }

    if !args.recursive {
        if let Some(r) = file_config.recursive {
            config.recursive = r;
        }
    }

    if args.glob == DEFAULT_GLOB {
        if let Some(g) = file_config.glob {
            config.glob = g;
        }
    }

    if !args.no_gitignore {
        if let Some(gi) = file_config.gitignore {
            config.gitignore = gi;
        }
    }

    if args.max_depth == 0 {
        if let Some(d) = file_config.max_depth {
            config.max_depth = d;
        }
    }

    if let Some(editor) = file_config.editor {
        config.editor = EditorConfig {
            debug: args.debug || editor.debug,
            ..editor
        };
    }

    Ok(config)
}

/// Default config file content
const DEFAULT_CONFIG: &str = r#"# .mdtablerc - mdtable configuration file

# Output options
# verbose = false
# color = "auto"
# json = false

# Backup options (for --in-place)
# backup = false
# backup_ext = ".bak"

# Recursive mode defaults
# recursive = false
# glob = "*.md,*.markdown"
# gitignore = true
# max_depth = 0

[editor]
# Reformat the table when moving between cells (mdtable edit next/prev)
auto_format_on_tab = true

# Warn when a single table operation takes longer than this
perf_warn_threshold_ms = 24

# Log detected tables and operations
# debug = false
"#;

/// Handle the config subcommand
fn run_config_command(action: &ConfigAction, args: &Args) -> Result<()> {
    match action {
        ConfigAction::Init { global } => {
            let path = if *global {
                dirs::home_dir()
                    .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?
                    .join(".mdtablerc")
            } else {
                PathBuf::from(".mdtablerc")
            };

            if path.exists() {
                return Err(anyhow::anyhow!(
                    "Config file already exists: {}",
                    path.display()
                ));
            }

            fs::write(&path, DEFAULT_CONFIG)
                .with_context(|| format!("Failed to create config file: {}", path.display()))?;

            eprintln!("Created config file: {}", path.display());
            Ok(())
        }

        ConfigAction::Show => {
            let config = create_config(args)?;

            eprintln!("Effective configuration:");
            eprintln!("  verbose: {}", config.verbose);
            eprintln!("  color: {:?}", config.color);
            eprintln!("  json: {}", config.json);
            eprintln!("  backup: {}", config.backup);
            eprintln!("  backup_ext: {}", config.backup_ext);
            eprintln!("  recursive: {}", config.recursive);
            eprintln!("  glob: {}", config.glob);
            eprintln!("  gitignore: {}", config.gitignore);
            eprintln!("  max_depth: {}", config.max_depth);
            eprintln!("  editor.auto_format_on_tab: {}", config.editor.auto_format_on_tab);
            eprintln!(
                "  editor.perf_warn_threshold_ms: {}",
                config.editor.perf_warn_threshold_ms
            );
            eprintln!("  editor.debug: {}", config.editor.debug);

            let start_dir = config_search_dir(None);
            if let Some(path) = resolve_config_path(args, &start_dir)? {
                eprintln!();
                eprintln!("Config file: {}", path.display());
            }

            Ok(())
        }

        ConfigAction::Path => {
            let start_dir = config_search_dir(None);
            match find_config_file(&start_dir) {
                Some(path) => {
                    println!("{}", path.display());
                    Ok(())
                }
                None => anyhow::bail!("No config file found"),
            }
        }
    }
}

fn validate_args(args: &Args) -> Result<()> {
    if let Some(ref lines) = args.lines {
        parse_line_ranges(lines).map_err(|err| ArgError(format!("--lines: {}", err)))?;
    }

    if args.in_place && args.inputs.is_empty() {
        return Err(ArgError("--in-place requires at least one input file".to_string()).into());
    }

    if args.recursive && args.inputs.is_empty() {
        return Err(ArgError("--recursive requires at least one input path".to_string()).into());
    }

    Ok(())
}

fn validate_edit_args(edit: &EditArgs) -> Result<()> {
    if edit.line == 0 {
        return Err(ArgError("--line starts at 1, not 0".to_string()).into());
    }

    if edit.column == 0 {
        return Err(ArgError("--column starts at 1, not 0".to_string()).into());
    }

    if edit.repeat == 0 {
        return Err(ArgError("--repeat must be at least 1".to_string()).into());
    }

    Ok(())
}

/// Statistics collected while formatting
#[derive(Debug, Default, Clone)]
struct Stats {
    /// Number of tables detected
    tables_found: usize,
    /// Number of tables whose text changed
    tables_modified: usize,
    /// Number of tables skipped (outside line ranges or incomplete)
    tables_skipped: usize,
    /// Lines rewritten across all modified tables
    rows_rewritten: usize,
    /// Total number of lines processed
    total_lines: usize,
    /// Processing elapsed time
    elapsed: Duration,
}

impl Stats {
    /// Merge another Stats into this one (for aggregating across files)
    fn merge(&mut self, other: &Stats) {
        self.tables_found += other.tables_found;
        self.tables_modified += other.tables_modified;
        self.tables_skipped += other.tables_skipped;
        self.rows_rewritten += other.rows_rewritten;
        self.total_lines += other.total_lines;
        self.elapsed += other.elapsed;
    }

    /// Calculate lines processed per second
    fn lines_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total_lines as f64 / secs
        } else {
            self.total_lines as f64
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON Output Structures
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct JsonOutput {
    version: &'static str,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    input: InputStats,
    processing: ProcessingStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<OutputStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Serialize)]
struct InputStats {
    lines: usize,
    bytes: usize,
}

#[derive(Serialize)]
struct ProcessingStats {
    tables_detected: usize,
    tables_modified: usize,
    tables_skipped: usize,
}

#[derive(Serialize)]
struct OutputStats {
    lines: usize,
    bytes: usize,
    changed: bool,
}

/// Report of a single `mdtable edit` run
#[derive(Serialize)]
struct EditJsonOutput {
    version: &'static str,
    status: &'static str,
    operation: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    handled: bool,
    changed: bool,
    cursor: CursorJson,
    #[serde(skip_serializing_if = "Option::is_none")]
    edit_kind: Option<EditKind>,
    undo_groups: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Serialize)]
struct CursorJson {
    line: usize,
    column: usize,
    offset: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Table Formatting
// ─────────────────────────────────────────────────────────────────────────────

/// Header with at least two cells followed by an alignment row
fn is_complete_table(rows: &[String]) -> bool {
    rows.len() >= 2 && tokenize(&rows[0]).len() >= 2 && is_alignment_line(&rows[1])
}

/// Format every table in the document
fn format_document(
    lines: Vec<String>,
    config: &Config,
    console: &Console,
    styles: &VerboseStyle,
) -> (Vec<String>, Stats) {
    let start_time = Instant::now();
    let mut stats = Stats {
        total_lines: lines.len(),
        ..Stats::default()
    };

    if config.verbose {
        if let Some(ref ranges) = config.lines {
            console.print(&styles.header(format!(
                "Line ranges: {}",
                format_line_ranges(ranges, lines.len())
            )));
        }
    }

    let regions = find_tables(&lines);
    stats.tables_found = regions.len();

    if config.verbose {
        console.print(&styles.header(format!("Found {} table(s)", regions.len())));
    }

    let mut lines = lines;
    for (i, region) in regions.iter().enumerate() {
        let label = format!(
            "  Table {}: lines {}-{}",
            i + 1,
            region.start_line,
            region.end_line
        );

        if let Some(ref ranges) = config.lines {
            if !region_overlaps_ranges(region, ranges) {
                if config.verbose {
                    console.print(&styles.dim(format!("{} (skipped: outside line ranges)", label)));
                }
                stats.tables_skipped += 1;
                continue;
            }
        }

        let span = region.start_line - 1..region.end_line;
        if !is_complete_table(&lines[span.clone()]) {
            if config.verbose {
                console.print(&styles.dim(format!("{} (skipped: no alignment row)", label)));
            }
            if config.editor.debug {
                debug!(start = region.start_line, end = region.end_line, "incomplete table");
            }
            stats.tables_skipped += 1;
            continue;
        }

        let formatted = format_table(&lines[span.clone()]);
        if formatted.as_slice() == &lines[span.clone()] {
            if config.verbose {
                console.print(&styles.dim(format!("{} (already formatted)", label)));
            }
            continue;
        }

        if config.verbose {
            console.print(&styles.table(format!(
                "{} ({} column(s), {} row(s))",
                label,
                tokenize(&formatted[0]).len(),
                formatted.len()
            )));
        }
        if config.editor.debug {
            debug!(
                start = region.start_line,
                end = region.end_line,
                "formatted table"
            );
        }

        stats.tables_modified += 1;
        stats.rows_rewritten += formatted
            .iter()
            .zip(&lines[span.clone()])
            .filter(|(new, old)| new != old)
            .count();
        // Formatting never changes the line count, so later regions keep
        // their positions.
        for (slot, line) in lines[span].iter_mut().zip(formatted) {
            *slot = line;
        }
    }

    stats.elapsed = start_time.elapsed();
    (lines, stats)
}

// ─────────────────────────────────────────────────────────────────────────────
// Structural Edits
// ─────────────────────────────────────────────────────────────────────────────

/// Byte offset of a 1-indexed line and character column
fn cursor_offset(text: &str, line: usize, column: usize) -> Result<usize> {
    let index = LineIndex::new(text);
    if line == 0 || line > index.line_count() {
        return Err(ArgError(format!(
            "--line {} is outside the document ({} line(s))",
            line,
            index.line_count()
        ))
        .into());
    }

    let start = index.line_start(line);
    let content = &text[start..index.line_end(line)];
    let content = content.strip_suffix('\r').unwrap_or(content);

    content
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(content.len()))
        .nth(column.saturating_sub(1))
        .and_then(|byte| index.offset(line, byte))
        .ok_or_else(|| {
            ArgError(format!(
                "--column {} is past the end of line {}",
                column, line
            ))
            .into()
        })
}

/// 1-indexed line and character column of a byte offset
fn cursor_position(text: &str, offset: usize) -> (usize, usize) {
    let index = LineIndex::new(text);
    let (line, byte_column) = index.position(offset);
    let start = index.line_start(line);
    let column = text[start..start + byte_column].chars().count() + 1;
    (line, column)
}

fn resolve_editor_config(args: &Args, edit: &EditArgs) -> Result<EditorConfig> {
    let start_dir = config_search_dir(edit.file.as_ref());
    let mut editor = match resolve_config_path(args, &start_dir)? {
        Some(path) => load_config_file(&path)?.editor.unwrap_or_default(),
        None => EditorConfig::default(),
    };

    if edit.no_auto_format {
        editor.auto_format_on_tab = false;
    }
    if args.debug {
        editor.debug = true;
    }

    Ok(editor)
}

fn run_edit_command(args: &Args, edit: &EditArgs) -> Result<RunOutcome> {
    validate_edit_args(edit)?;

    let (text, label) = match edit.file {
        Some(ref path) => (read_file(path)?, path.display().to_string()),
        None => (read_stdin_content()?, "stdin".to_string()),
    };

    let editor = TableEditor::new(resolve_editor_config(args, edit)?);
    let operation = edit.op.operation();
    let offset = cursor_offset(&text, edit.line, edit.column)?;

    let mut buffer = Buffer::new(text.as_str(), offset);
    let mut handled = false;
    for _ in 0..edit.repeat {
        if !editor.run(&mut buffer, operation) {
            break;
        }
        handled = true;
    }

    let changed = buffer.text() != text;
    let (line, column) = cursor_position(buffer.text(), buffer.cursor());

    if edit.json {
        let report = EditJsonOutput {
            version: "1.0",
            status: if handled { "handled" } else { "not_handled" },
            operation: operation.name(),
            file: Some(label),
            handled,
            changed,
            cursor: CursorJson {
                line,
                column,
                offset: buffer.cursor(),
            },
            edit_kind: buffer.last_kind(),
            undo_groups: buffer.undo_depth(),
            content: if edit.in_place {
                None
            } else {
                Some(buffer.text().to_string())
            },
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize JSON output")?
        );
    } else {
        if !handled {
            eprintln!(
                "No table at line {}, column {}; document unchanged",
                edit.line, edit.column
            );
        }
        if !edit.in_place {
            let mut stdout = io::stdout().lock();
            write!(stdout, "{}", buffer.text())?;
        }
        eprintln!("Cursor: {}:{}", line, column);
    }

    if edit.in_place && changed {
        let path = edit
            .file
            .as_ref()
            .ok_or_else(|| ArgError("--in-place requires an input file".to_string()))?;
        fs::write(path, buffer.text())
            .with_context(|| format!("Failed to write to file: {}", path.display()))?;
    }

    Ok(RunOutcome {
        dry_run: false,
        would_change: changed,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Recursive File Discovery
// ─────────────────────────────────────────────────────────────────────────────

fn build_globset(patterns: &str) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    let mut added = 0;

    for pattern in patterns.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let glob = Glob::new(pattern)
            .map_err(|err| ArgError(format!("Invalid glob pattern '{}': {}", pattern, err)))?;
        builder.add(glob);
        added += 1;
    }

    if added == 0 {
        return Err(ArgError("--glob must include at least one pattern".to_string()).into());
    }

    builder
        .build()
        .map_err(|err| ArgError(format!("Invalid glob set: {}", err)).into())
}

fn discover_recursive_files(
    paths: &[PathBuf],
    config: &Config,
    console: &Console,
    styles: &VerboseStyle,
) -> Result<Vec<PathBuf>> {
    let globs = build_globset(&config.glob)?;
    let mut files = std::collections::BTreeSet::new();

    for path in paths {
        if path.is_file() {
            files.insert(path.clone());
            continue;
        }

        if !path.is_dir() {
            if config.verbose {
                console.print(&styles.dim(format!(
                    "Warning: path does not exist: {}",
                    path.display()
                )));
            }
            continue;
        }

        let mut walker = WalkBuilder::new(path);
        walker
            .git_ignore(config.gitignore)
            .git_exclude(config.gitignore)
            .git_global(config.gitignore)
            .ignore(config.gitignore)
            .hidden(false);

        if config.max_depth > 0 {
            walker.max_depth(Some(config.max_depth));
        }

        for entry in walker.build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    if config.verbose {
                        console.print(&styles.dim(format!("Warning: {}", err)));
                    }
                    continue;
                }
            };

            let entry_path = entry.path();
            let matches = entry_path
                .file_name()
                .is_some_and(|name| globs.is_match(name));
            if entry_path.is_file() && matches {
                files.insert(entry_path.to_path_buf());
            }
        }
    }

    Ok(files.into_iter().collect())
}

// ─────────────────────────────────────────────────────────────────────────────
// Input and Backup
// ─────────────────────────────────────────────────────────────────────────────

/// Creates a backup of the file by appending the extension to the filename.
/// For example: "notes.md" with extension ".bak" becomes "notes.md.bak"
fn create_backup(path: &Path, ext: &str) -> Result<PathBuf> {
    let mut backup_name = path.as_os_str().to_owned();
    backup_name.push(ext);
    let backup_path = PathBuf::from(backup_name);

    fs::copy(path, &backup_path)
        .with_context(|| format!("Failed to create backup at {}", backup_path.display()))?;

    Ok(backup_path)
}

/// Maximum file size (100 MB) - reject larger files to prevent memory issues
const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Read a file as text
fn read_file(path: &Path) -> Result<String> {
    let metadata = fs::metadata(path)
        .with_context(|| format!("Failed to read file metadata: {}", path.display()))?;

    if metadata.len() > MAX_FILE_SIZE {
        return Err(ParseError(format!(
            "File too large: {} ({} MB). Maximum supported size is {} MB.",
            path.display(),
            metadata.len() / (1024 * 1024),
            MAX_FILE_SIZE / (1024 * 1024)
        ))
        .into());
    }

    let bytes =
        fs::read(path).with_context(|| format!("Failed to read input file: {}", path.display()))?;

    parse_bytes_to_text(bytes, &path.display().to_string())
}

/// Read all of stdin as text
fn read_stdin_content() -> Result<String> {
    let mut buf = Vec::new();
    io::stdin()
        .read_to_end(&mut buf)
        .context("Failed to read stdin")?;
    parse_bytes_to_text(buf, "stdin")
}

/// Convert raw bytes to text, rejecting binary content and invalid UTF-8
fn parse_bytes_to_text(bytes: Vec<u8>, source_label: &str) -> Result<String> {
    if bytes.contains(&0) {
        return Err(ParseError(format!("Input appears to be binary: {}", source_label)).into());
    }

    String::from_utf8(bytes).map_err(|err| {
        let utf8_err = err.utf8_error();
        let valid_up_to = utf8_err.valid_up_to();
        let byte = err.as_bytes().get(valid_up_to).copied();
        let detail = match byte {
            Some(b) => format!(
                "Invalid UTF-8 at byte position {} (byte value: 0x{:02X}) in {}",
                valid_up_to, b, source_label
            ),
            None => format!("Invalid UTF-8 in {}", source_label),
        };
        ParseError(detail).into()
    })
}

/// Split text into lines, remembering whether it used CRLF endings
fn split_lines(text: &str) -> (Vec<String>, &'static str) {
    let eol = if text.contains("\r\n") { "\r\n" } else { "\n" };
    (text.lines().map(String::from).collect(), eol)
}

/// Join lines back into file content. The last line is terminated only when
/// the input's was.
fn render_lines(lines: &[String], eol: &str, final_newline: bool) -> String {
    let mut output = lines.join(eol);
    if final_newline && !lines.is_empty() {
        output.push_str(eol);
    }
    output
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry Point
// ─────────────────────────────────────────────────────────────────────────────

/// Result of processing a single file or stdin
struct FileResult {
    filename: String,
    original: Vec<String>,
    formatted: Vec<String>,
    eol: &'static str,
    final_newline: bool,
    stats: Stats,
    would_change: bool,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => exit_codes::SUCCESS,
                _ => exit_codes::INVALID_ARGS,
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    init_tracing(args.debug);

    let result = match args.command {
        Some(ref command) => run_command(command, &args),
        None => run(&args),
    };

    let exit_code = match result {
        Ok(outcome) => {
            if outcome.dry_run && outcome.would_change {
                exit_codes::WOULD_CHANGE
            } else {
                exit_codes::SUCCESS
            }
        }
        Err(err) => {
            eprintln!("Error: {:#}", err);
            exit_code_for_error(&err)
        }
    };

    std::process::exit(exit_code);
}

fn run_command(command: &Commands, args: &Args) -> Result<RunOutcome> {
    match command {
        Commands::Edit(edit) => run_edit_command(args, edit),
        Commands::Config { action } => {
            run_config_command(action, args)?;
            Ok(RunOutcome {
                dry_run: false,
                would_change: false,
            })
        }
    }
}

/// Process a single input (file or stdin) and return the result
fn process_input(
    text: &str,
    filename: String,
    config: &Config,
    console: &Console,
    styles: &VerboseStyle,
) -> FileResult {
    let (lines, eol) = split_lines(text);

    if config.verbose {
        console.print(&styles.bold(format!(
            "Processing {} ({} lines)...",
            filename,
            lines.len()
        )));
    }

    let original = lines.clone();
    let (formatted, stats) = format_document(lines, config, console, styles);
    let would_change = original != formatted;

    FileResult {
        filename,
        original,
        formatted,
        eol,
        final_newline: text.ends_with('\n'),
        stats,
        would_change,
    }
}

/// Output a unified diff for a file result
fn output_diff(result: &FileResult, proposed: bool) -> Result<()> {
    if !result.would_change {
        return Ok(());
    }

    let original_text = result.original.join("\n");
    let formatted_text = result.formatted.join("\n");
    let diff = TextDiff::from_lines(&original_text, &formatted_text);
    let mut stdout = io::stdout().lock();

    writeln!(stdout, "--- a/{}", result.filename)?;
    if proposed {
        writeln!(stdout, "+++ b/{} (proposed)", result.filename)?;
    } else {
        writeln!(stdout, "+++ b/{}", result.filename)?;
    }

    for hunk in diff.unified_diff().context_radius(3).iter_hunks() {
        writeln!(stdout, "{}", hunk.header())?;
        for change in hunk.iter_changes() {
            let sign = match change.tag() {
                ChangeTag::Delete => "-",
                ChangeTag::Insert => "+",
                ChangeTag::Equal => " ",
            };
            let line = change.value();
            if line.ends_with('\n') {
                write!(stdout, "{}{}", sign, line)?;
            } else {
                writeln!(stdout, "{}{}", sign, line)?;
            }
        }
    }

    Ok(())
}

/// Write the formatted content of `result` to `path`, with an optional backup
fn write_in_place(
    path: &Path,
    result: &FileResult,
    config: &Config,
    console: &Console,
    styles: &VerboseStyle,
) -> Result<()> {
    if config.backup {
        let backup_path = create_backup(path, &config.backup_ext)?;
        if config.verbose {
            console.print(&styles.dim(format!("Created backup: {}", backup_path.display())));
        }
    }

    let content = render_lines(&result.formatted, result.eol, result.final_newline);
    fs::write(path, content)
        .with_context(|| format!("Failed to write to file: {}", path.display()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Watch Mode
// ─────────────────────────────────────────────────────────────────────────────

/// Watch a file for changes and reformat its tables on each save
fn watch_and_format(
    path: &Path,
    config: &Config,
    console: &Console,
    styles: &VerboseStyle,
) -> Result<RunOutcome> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    if !path.is_file() {
        anyhow::bail!(
            "--watch requires a file, not a directory: {}",
            path.display()
        );
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let (tx, rx) = mpsc::channel();
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        },
        notify::Config::default(),
    )
    .context("Failed to create file watcher")?;

    watcher
        .watch(path, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch file: {}", path.display()))?;

    let debounce = Duration::from_millis(config.debounce_ms);
    // Allow an immediate first run
    let mut last_event = Instant::now()
        .checked_sub(debounce)
        .unwrap_or_else(Instant::now);

    eprintln!(
        "Watching {} for changes (Ctrl+C to stop)...",
        path.display()
    );

    let mut any_changes = false;

    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => {
                if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    continue;
                }
                let now = Instant::now();
                if now.duration_since(last_event) < debounce {
                    continue;
                }
                last_event = now;

                let text = match read_file(path) {
                    Ok(text) => text,
                    Err(e) => {
                        eprintln!("✗ Error reading file: {:#}", e);
                        continue;
                    }
                };

                let result =
                    process_input(&text, path.display().to_string(), config, console, styles);
                if !result.would_change {
                    eprintln!("✓ Tables already formatted");
                    continue;
                }

                // Our own write triggers another event; the debounce and the
                // unchanged check absorb it.
                let content =
                    render_lines(&result.formatted, result.eol, result.final_newline);
                match fs::write(path, content) {
                    Ok(()) => {
                        eprintln!("✓ Formatted {} table(s)", result.stats.tables_modified);
                        any_changes = true;
                    }
                    Err(e) => eprintln!("✗ Failed to write: {}", e),
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    eprintln!("\nWatch mode stopped.");

    Ok(RunOutcome {
        dry_run: false,
        would_change: any_changes,
    })
}

fn run(args: &Args) -> Result<RunOutcome> {
    validate_args(args)?;

    let config = create_config(args)?;
    let (console, styles) = build_console(config.color);

    if config.watch {
        if args.inputs.len() != 1 {
            anyhow::bail!("--watch requires exactly one input file");
        }
        return watch_and_format(&args.inputs[0], &config, &console, &styles);
    }

    if config.recursive {
        let files = discover_recursive_files(&args.inputs, &config, &console, &styles)?;
        if files.is_empty() {
            let message = format!(
                "Warning: No files matched pattern '{}' in provided paths",
                config.glob
            );
            if config.verbose {
                console.print(&styles.dim(message));
            } else {
                eprintln!("{}", message);
            }
            return Ok(RunOutcome {
                dry_run: config.dry_run,
                would_change: false,
            });
        }

        return output_multiple_results(args, &config, &console, &styles, &files);
    }

    match args.inputs.as_slice() {
        [] => {
            let text = read_stdin_content()?;
            let result = process_input(&text, "stdin".to_string(), &config, &console, &styles);
            output_single_result(args, &config, &console, &styles, result)
        }
        [path] => {
            let text = read_file(path)?;
            let result = process_input(
                &text,
                path.display().to_string(),
                &config,
                &console,
                &styles,
            );
            output_single_result(args, &config, &console, &styles, result)
        }
        paths => output_multiple_results(args, &config, &console, &styles, paths),
    }
}

/// Handle output for a single file/stdin result
fn output_single_result(
    args: &Args,
    config: &Config,
    console: &Console,
    styles: &VerboseStyle,
    result: FileResult,
) -> Result<RunOutcome> {
    let would_change = result.would_change;

    if config.json {
        output_json_single(args, config, &result, args.inputs.first())?;
    } else if config.dry_run {
        output_dry_run_single(config, console, styles, &result)?;
    } else if config.diff {
        output_diff(&result, false)?;
    } else if args.in_place {
        let path = args
            .inputs
            .first()
            .ok_or_else(|| ArgError("--in-place requires an input file".to_string()))?;
        write_in_place(path, &result, config, console, styles)?;
    } else {
        let mut stdout = io::stdout().lock();
        let content = render_lines(&result.formatted, result.eol, result.final_newline);
        write!(stdout, "{}", content)?;
    }

    if config.verbose {
        print_stats_summary(
            &result.stats,
            1,
            usize::from(would_change),
            0,
            console,
            styles,
        );
    }

    Ok(RunOutcome {
        dry_run: config.dry_run,
        would_change,
    })
}

/// Output JSON for a single file result; writes `path` when editing in place
fn output_json_single(
    args: &Args,
    config: &Config,
    result: &FileResult,
    path: Option<&PathBuf>,
) -> Result<()> {
    let original_text = render_lines(&result.original, result.eol, result.final_newline);
    let formatted_text = render_lines(&result.formatted, result.eol, result.final_newline);

    let json_output = JsonOutput {
        version: "1.0",
        status: if config.dry_run {
            "dry_run".to_string()
        } else {
            "success".to_string()
        },
        file: Some(result.filename.clone()),
        input: InputStats {
            lines: result.original.len(),
            bytes: original_text.len(),
        },
        processing: ProcessingStats {
            tables_detected: result.stats.tables_found,
            tables_modified: result.stats.tables_modified,
            tables_skipped: result.stats.tables_skipped,
        },
        output: Some(OutputStats {
            lines: result.formatted.len(),
            bytes: formatted_text.len(),
            changed: result.would_change,
        }),
        content: if !config.dry_run && !args.in_place {
            Some(formatted_text.clone())
        } else {
            None
        },
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&json_output).context("Failed to serialize JSON output")?
    );

    if args.in_place {
        if let Some(path) = path {
            if config.backup {
                create_backup(path, &config.backup_ext)?;
            }
            fs::write(path, &formatted_text)
                .with_context(|| format!("Failed to write to file: {}", path.display()))?;
        }
    }

    Ok(())
}

/// Output dry-run info for a single file
fn output_dry_run_single(
    config: &Config,
    console: &Console,
    styles: &VerboseStyle,
    result: &FileResult,
) -> Result<()> {
    if config.diff && result.would_change {
        output_diff(result, true)?;
    }

    if config.verbose {
        if result.would_change {
            console.print(&styles.table(format!("Would modify: {}", result.filename)));
            console.print(&styles.dim(format!(
                "  {} table(s), {} row(s)",
                result.stats.tables_modified, result.stats.rows_rewritten
            )));
        } else {
            console.print(&styles.success(format!("No changes needed: {}", result.filename)));
        }
    }

    Ok(())
}

/// Handle output for multiple files
fn output_multiple_results(
    args: &Args,
    config: &Config,
    console: &Console,
    styles: &VerboseStyle,
    paths: &[PathBuf],
) -> Result<RunOutcome> {
    let mut total_files_processed = 0;
    let mut total_files_changed = 0;
    let mut aggregated_stats = Stats::default();
    let mut any_would_change = false;
    let mut errors: Vec<(PathBuf, anyhow::Error)> = Vec::new();

    let show_file_headers = !args.in_place && !config.diff && !config.json && paths.len() > 1;

    for path in paths {
        let text = match read_file(path) {
            Ok(text) => text,
            Err(e) => {
                eprintln!("Error processing {}: {:#}", path.display(), e);
                errors.push((path.clone(), e));
                continue;
            }
        };

        let result = process_input(&text, path.display().to_string(), config, console, styles);

        if result.would_change {
            any_would_change = true;
            total_files_changed += 1;
        }
        total_files_processed += 1;
        aggregated_stats.merge(&result.stats);

        if config.json {
            output_json_single(args, config, &result, Some(path))?;
        } else if config.dry_run {
            output_dry_run_single(config, console, styles, &result)?;
        } else if config.diff {
            output_diff(&result, false)?;
        } else if args.in_place {
            write_in_place(path, &result, config, console, styles)?;

            if config.verbose {
                if result.would_change {
                    console.print(&styles.success(format!(
                        "{}: {} table(s) formatted",
                        path.display(),
                        result.stats.tables_modified
                    )));
                } else {
                    console.print(&styles.dim(format!("{}: No changes needed", path.display())));
                }
            }
        } else {
            let mut stdout = io::stdout().lock();

            if show_file_headers {
                writeln!(stdout, "==> {} <==", path.display())?;
            }

            let content = render_lines(&result.formatted, result.eol, result.final_newline);
            write!(stdout, "{}", content)?;

            if show_file_headers {
                writeln!(stdout)?;
            }
        }
    }

    if config.verbose {
        print_stats_summary(
            &aggregated_stats,
            total_files_processed,
            total_files_changed,
            errors.len(),
            console,
            styles,
        );
    }

    if !errors.is_empty() {
        let files = errors
            .iter()
            .map(|(p, _)| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let has_parse_error = errors
            .iter()
            .any(|(_, err)| error_chain_has::<ParseError>(err));

        if has_parse_error {
            return Err(ParseError(format!(
                "{} file(s) had parse errors: {}",
                errors.len(),
                files
            ))
            .into());
        }

        anyhow::bail!("{} file(s) had errors: {}", errors.len(), files);
    }

    Ok(RunOutcome {
        dry_run: config.dry_run,
        would_change: any_would_change,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
