//! Widget abstraction: the capabilities the pagination driver needs from its environment.
//!
//! Implementations own every host-specific guess (where the table is, which
//! button means "next"). The driver only sees an optional table snapshot and
//! an optional, unambiguous next-page control.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::watch;

use crate::extract::RawTable;
use crate::signature::{await_signature_change, ChangeOutcome};
use crate::types::HarvestResult;

/// The "advance to next page" action of a widget.
#[async_trait]
pub trait PageControl: Send + Sync {
    /// Whether the control is disabled (no further pages).
    fn is_disabled(&self) -> bool;
    /// Perform the action.
    async fn trigger(&self) -> HarvestResult<()>;
}

/// A rendered dashboard panel containing one table and its pagination controls.
#[async_trait]
pub trait Widget: Send + Sync {
    /// Snapshot the widget's table, or `None` if it has no table.
    async fn table(&self) -> HarvestResult<Option<RawTable>>;

    /// Look up the next-page control. Called fresh on every page.
    async fn next_control(&self) -> HarvestResult<Option<Box<dyn PageControl>>>;

    /// Push feed of body signatures, if the environment can notify on changes.
    fn change_feed(&self) -> Option<watch::Receiver<String>> {
        None
    }

    /// Wait for the table signature to move away from `previous`.
    async fn await_change(&self, previous: &str, timeout: Duration) -> HarvestResult<ChangeOutcome> {
        Ok(await_signature_change(self.change_feed(), previous, timeout).await)
    }
}
