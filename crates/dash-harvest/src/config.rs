//! Harvest configuration: defaults plus `DASH_HARVEST_*` environment overrides.

use std::time::Duration;

/// Per-transition wait for the table body to change after "next".
pub const DEFAULT_PAGE_TIMEOUT_MS: u64 = 8_000;
/// Circuit breaker against a "next" control that never disables.
pub const DEFAULT_MAX_PAGES: usize = 2_000;
/// Characters of body text kept in a signature.
pub const DEFAULT_SIGNATURE_CHARS: usize = 300;
/// File name used for every export run.
pub const DEFAULT_EXPORT_FILENAME: &str = "all_dialogs.txt";

/// Text markers used to locate a widget's pagination controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagerMarkers {
    /// Substrings identifying the "rows X–Y of Z" label next to the pager.
    pub range_labels: Vec<String>,
    /// Substrings of a next button's `aria-label`.
    pub next_labels: Vec<String>,
}

impl Default for PagerMarkers {
    fn default() -> Self {
        Self {
            range_labels: vec!["Строки:".to_string(), "Rows:".to_string()],
            next_labels: vec!["След".to_string(), "Next".to_string()],
        }
    }
}

/// Settings for one export run.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub page_timeout: Duration,
    pub max_pages: usize,
    pub signature_chars: usize,
    pub export_filename: String,
    pub markers: PagerMarkers,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            page_timeout: Duration::from_millis(DEFAULT_PAGE_TIMEOUT_MS),
            max_pages: DEFAULT_MAX_PAGES,
            signature_chars: DEFAULT_SIGNATURE_CHARS,
            export_filename: DEFAULT_EXPORT_FILENAME.to_string(),
            markers: PagerMarkers::default(),
        }
    }
}

impl HarvestConfig {
    /// Defaults overridden by environment variables.
    ///
    /// - `DASH_HARVEST_PAGE_TIMEOUT_MS`
    /// - `DASH_HARVEST_MAX_PAGES` (minimum 1)
    /// - `DASH_HARVEST_SIGNATURE_CHARS` (minimum 1)
    /// - `DASH_HARVEST_FILENAME`
    /// - `DASH_HARVEST_RANGE_LABELS`, `DASH_HARVEST_NEXT_LABELS` (comma-separated)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let markers = PagerMarkers {
            range_labels: read_env_list("DASH_HARVEST_RANGE_LABELS")
                .unwrap_or(defaults.markers.range_labels),
            next_labels: read_env_list("DASH_HARVEST_NEXT_LABELS")
                .unwrap_or(defaults.markers.next_labels),
        };
        Self {
            page_timeout: Duration::from_millis(read_env_u64(
                "DASH_HARVEST_PAGE_TIMEOUT_MS",
                DEFAULT_PAGE_TIMEOUT_MS,
            )),
            max_pages: read_env_usize("DASH_HARVEST_MAX_PAGES", defaults.max_pages).max(1),
            signature_chars: read_env_usize(
                "DASH_HARVEST_SIGNATURE_CHARS",
                defaults.signature_chars,
            )
            .max(1),
            export_filename: read_env_string("DASH_HARVEST_FILENAME")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.export_filename),
            markers,
        }
    }
}

fn read_env_u64(name: &str, default_value: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default_value)
}

fn read_env_usize(name: &str, default_value: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default_value)
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string())
}

fn read_env_list(name: &str) -> Option<Vec<String>> {
    let raw = read_env_string(name)?;
    let items: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}
