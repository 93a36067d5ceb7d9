//! Table snapshot extraction: raw cells in, resolved row records out.
//!
//! Adapters (HTML parser, live browser) describe the current table as a
//! [`RawTable`]. Resolution is pure and never fails; a malformed tooltip
//! payload is logged and the next strategy is tried.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::types::{HarvestError, RowRecord};

/// A link found inside a cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellLink {
    /// Visible link text (untrimmed).
    #[serde(default)]
    pub text: String,
    /// The `href` attribute (untrimmed).
    #[serde(default)]
    pub href: String,
}

/// One table cell as observed by an adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCell {
    /// Structured tooltip payload attached to a descendant element.
    #[serde(default)]
    pub tooltip: Option<String>,
    /// First link inside the cell.
    #[serde(default)]
    pub link: Option<CellLink>,
    /// Plain visible text of the whole cell (untrimmed).
    #[serde(default)]
    pub text: String,
}

impl RawCell {
    /// A cell with visible text only.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// A table body as observed by an adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTable {
    /// Body rows in document order; each row lists its data cells.
    #[serde(default)]
    pub rows: Vec<Vec<RawCell>>,
    /// Text content of the table body, used for the change signature.
    #[serde(default)]
    pub body_text: String,
}

#[derive(Debug, Deserialize)]
struct TooltipPayload {
    content: String,
}

fn absolute_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^https?://").expect("url regex is valid"))
}

/// Extract one record per data row; rows without cells are skipped.
pub fn extract_rows(table: &RawTable) -> Vec<RowRecord> {
    table
        .rows
        .iter()
        .filter(|cells| !cells.is_empty())
        .map(|cells| RowRecord::new(cells.iter().map(resolve_cell).collect()))
        .collect()
}

/// Resolve a cell's value: tooltip payload, then link, then plain text.
pub fn resolve_cell(cell: &RawCell) -> String {
    if let Some(raw) = cell.tooltip.as_deref() {
        match tooltip_value(raw) {
            Ok(Some(value)) => return value,
            Ok(None) => {}
            Err(e) => tracing::warn!("{e}; falling back to cell text"),
        }
    }

    if let Some(link) = &cell.link {
        let text = link.text.trim();
        if absolute_url_re().is_match(text) {
            return text.to_string();
        }
        if !text.is_empty() {
            return text.to_string();
        }
        return link.href.trim().to_string();
    }

    cell.text.trim().to_string()
}

/// Interpret a tooltip payload.
///
/// JSON objects must carry a non-blank string `content`; anything else
/// that starts with `{` is a parse error. Non-JSON payloads are used as-is.
fn tooltip_value(raw: &str) -> Result<Option<String>, HarvestError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if !trimmed.starts_with('{') {
        return Ok(Some(trimmed.to_string()));
    }

    let payload: TooltipPayload = serde_json::from_str(trimmed)
        .map_err(|e| HarvestError::TooltipParse(format!("{e} in {trimmed:?}")))?;
    let content = payload.content.trim();
    if content.is_empty() {
        Ok(None)
    } else {
        Ok(Some(content.to_string()))
    }
}
