//! Pagination driver — walk every page of a widget's table.
//!
//! ```text
//! Extract → CheckMore → Advance → AwaitChange → Extract | Done | Failed
//! ```
//!
//! The only suspension points are adapter calls and the change wait. A
//! "next" control that points back at an already visited page is not
//! detected; the page ceiling is the only guard against such loops.

use std::time::Duration;

use crate::config::HarvestConfig;
use crate::extract::extract_rows;
use crate::signature::{signature, ChangeOutcome};
use crate::types::{HarvestError, HarvestReport, HarvestResult, PageSnapshot, RowRecord, StopReason};
use crate::widget::{PageControl, Widget};

enum DriverState {
    Extract,
    CheckMore {
        signature: String,
    },
    Advance {
        signature: String,
        control: Box<dyn PageControl>,
    },
    AwaitChange {
        signature: String,
    },
    Done(StopReason),
}

/// Runs the extraction loop for one widget at a time.
#[derive(Debug, Clone)]
pub struct PaginationDriver {
    page_timeout: Duration,
    max_pages: usize,
    signature_chars: usize,
}

impl Default for PaginationDriver {
    fn default() -> Self {
        Self::new(&HarvestConfig::default())
    }
}

impl PaginationDriver {
    /// Create a driver from harvest settings.
    pub fn new(config: &HarvestConfig) -> Self {
        Self {
            page_timeout: config.page_timeout,
            max_pages: config.max_pages.max(1),
            signature_chars: config.signature_chars,
        }
    }

    /// Override the per-transition timeout.
    pub fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = timeout;
        self
    }

    /// Override the page ceiling (minimum 1).
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Snapshot the widget's current page.
    pub async fn snapshot(&self, widget: &dyn Widget) -> HarvestResult<PageSnapshot> {
        let table = widget.table().await?.ok_or(HarvestError::MissingTable)?;
        Ok(PageSnapshot {
            rows: extract_rows(&table),
            signature: signature(&table.body_text, self.signature_chars),
        })
    }

    /// Collect every row from every page of `widget`, in visitation order.
    pub async fn collect_all(&self, widget: &dyn Widget) -> HarvestResult<HarvestReport> {
        let mut rows: Vec<RowRecord> = Vec::new();
        let mut pages_visited = 0usize;
        let mut timed_out_transitions = 0usize;
        let mut state = DriverState::Extract;

        let stop = loop {
            state = match state {
                DriverState::Extract => {
                    let page = self.snapshot(widget).await?;
                    pages_visited += 1;
                    tracing::debug!("page {pages_visited}: {} rows", page.rows.len());
                    if page.rows.is_empty() {
                        DriverState::Done(StopReason::EmptyPage)
                    } else {
                        rows.extend(page.rows);
                        DriverState::CheckMore {
                            signature: page.signature,
                        }
                    }
                }
                DriverState::CheckMore { signature } => match widget.next_control().await? {
                    None => DriverState::Done(StopReason::NoMorePages),
                    Some(control) if control.is_disabled() => {
                        DriverState::Done(StopReason::NoMorePages)
                    }
                    Some(_) if pages_visited >= self.max_pages => {
                        DriverState::Done(StopReason::PageLimit)
                    }
                    Some(control) => DriverState::Advance { signature, control },
                },
                DriverState::Advance { signature, control } => {
                    control.trigger().await?;
                    DriverState::AwaitChange { signature }
                }
                DriverState::AwaitChange { signature } => {
                    match widget.await_change(&signature, self.page_timeout).await? {
                        ChangeOutcome::Changed => {}
                        ChangeOutcome::TimedOut => {
                            timed_out_transitions += 1;
                            tracing::debug!(
                                "table did not change within {}ms after page {pages_visited}; re-extracting anyway",
                                self.page_timeout.as_millis()
                            );
                        }
                    }
                    DriverState::Extract
                }
                DriverState::Done(reason) => break reason,
            };
        };

        if stop == StopReason::PageLimit {
            tracing::warn!(
                "stopped at the {}-page ceiling with a next page still offered",
                self.max_pages
            );
        }

        Ok(HarvestReport {
            rows,
            pages_visited,
            timed_out_transitions,
            stop,
        })
    }
}
