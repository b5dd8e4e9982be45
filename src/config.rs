//! Editor configuration.
//!
//! The host builds one [`EditorConfig`] and hands it to
//! [`crate::TableEditor::new`]; nothing is read from the environment.

use serde::{Deserialize, Serialize};

/// Default threshold for the slow-operation warning, in milliseconds.
pub const DEFAULT_PERF_WARN_THRESHOLD_MS: u64 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Reformat the table when Tab/Shift-Tab moves between cells
    pub auto_format_on_tab: bool,
    /// Operations slower than this are reported with a warning
    pub perf_warn_threshold_ms: u64,
    /// Log detected regions and operations (never changes behavior)
    pub debug: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            auto_format_on_tab: true,
            perf_warn_threshold_ms: DEFAULT_PERF_WARN_THRESHOLD_MS,
            debug: false,
        }
    }
}
