//! Core data types for harvested rows, pages, and run results.

use serde::{Deserialize, Serialize};

/// Field delimiter used when a row is flattened for export.
pub const FIELD_DELIMITER: char = '\t';

/// Line delimiter used between rows in an export.
pub const LINE_DELIMITER: char = '\n';

/// One extracted table row: resolved cell values in column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRecord {
    fields: Vec<String>,
}

impl RowRecord {
    /// Build a record from resolved cell values.
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    /// Resolved cell values in column order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no columns.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Join the fields with the tab delimiter.
    pub fn to_line(&self) -> String {
        let mut line = String::new();
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                line.push(FIELD_DELIMITER);
            }
            line.push_str(field);
        }
        line
    }
}

impl<S: Into<String>> FromIterator<S> for RowRecord {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

/// Rows visible at one pagination state, plus the body signature.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub rows: Vec<RowRecord>,
    pub signature: String,
}

/// Why a pagination run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The next-page control was absent or disabled.
    NoMorePages,
    /// A page yielded zero data rows.
    EmptyPage,
    /// The page ceiling was reached while a next page was still offered.
    PageLimit,
}

/// Outcome of a completed pagination run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestReport {
    /// Every row seen, in page-visitation order.
    pub rows: Vec<RowRecord>,
    /// Pages extracted, including a trailing empty page.
    pub pages_visited: usize,
    /// Transitions where the signature never changed before the timeout.
    pub timed_out_transitions: usize,
    pub stop: StopReason,
}

impl HarvestReport {
    /// Render all rows as export text: one line per row, tab-separated fields.
    pub fn to_tsv(&self) -> String {
        rows_to_tsv(&self.rows)
    }
}

/// Flatten rows into export text without a trailing newline.
pub fn rows_to_tsv(rows: &[RowRecord]) -> String {
    let mut out = String::new();
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            out.push(LINE_DELIMITER);
        }
        out.push_str(&row.to_line());
    }
    out
}

/// Errors that can occur while harvesting a widget.
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    #[error("No table found inside the widget")]
    MissingTable,

    #[error("No rows collected (the table may be empty)")]
    EmptyResult,

    #[error("Tooltip payload parse error: {0}")]
    TooltipParse(String),

    #[error("Page limit exceeded: stopped after {pages} pages with {rows} rows")]
    PageLimitExceeded { pages: usize, rows: usize },

    #[error("An export for this widget is already running")]
    Busy,

    #[error("Widget error: {0}")]
    Widget(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type HarvestResult<T> = Result<T, HarvestError>;
