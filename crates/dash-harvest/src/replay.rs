//! Replay widget: drive the pagination loop over saved HTML snapshots.
//!
//! Each snapshot is one page of the same widget. The page's own pager markup
//! decides whether a next control exists; triggering it moves to the following
//! snapshot and publishes the new signature on the change feed.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use crate::config::{HarvestConfig, PagerMarkers};
use crate::extract::RawTable;
use crate::html::{find_next_control, parse_widget_table};
use crate::signature::signature;
use crate::types::{HarvestError, HarvestResult};
use crate::widget::{PageControl, Widget};

struct ReplayState {
    pages: Vec<String>,
    current: Mutex<usize>,
    feed: watch::Sender<String>,
    signature_chars: usize,
}

impl ReplayState {
    fn current(&self) -> HarvestResult<usize> {
        self.current
            .lock()
            .map(|guard| *guard)
            .map_err(|_| HarvestError::Widget("replay state lock poisoned".to_string()))
    }

    fn page_signature(&self, index: usize) -> String {
        self.pages
            .get(index)
            .and_then(|html| parse_widget_table(html))
            .map(|table| signature(&table.body_text, self.signature_chars))
            .unwrap_or_default()
    }
}

/// A widget backed by an ordered list of HTML snapshots.
pub struct ReplayWidget {
    state: Arc<ReplayState>,
    markers: PagerMarkers,
}

impl ReplayWidget {
    pub fn new(pages: Vec<String>, config: &HarvestConfig) -> Self {
        let (feed, _) = watch::channel(String::new());
        let state = Arc::new(ReplayState {
            pages,
            current: Mutex::new(0),
            feed,
            signature_chars: config.signature_chars,
        });
        state.feed.send_replace(state.page_signature(0));
        Self {
            state,
            markers: config.markers.clone(),
        }
    }

    /// Index of the snapshot currently shown.
    pub fn current_page(&self) -> usize {
        self.state.current().unwrap_or(0)
    }

    fn current_html(&self) -> HarvestResult<Option<&str>> {
        let index = self.state.current()?;
        Ok(self.state.pages.get(index).map(String::as_str))
    }
}

#[async_trait]
impl Widget for ReplayWidget {
    async fn table(&self) -> HarvestResult<Option<RawTable>> {
        Ok(self.current_html()?.and_then(parse_widget_table))
    }

    async fn next_control(&self) -> HarvestResult<Option<Box<dyn PageControl>>> {
        let index = self.state.current()?;
        let Some(html) = self.state.pages.get(index) else {
            return Ok(None);
        };
        let Some(found) = find_next_control(html, &self.markers) else {
            return Ok(None);
        };
        let has_following = index + 1 < self.state.pages.len();
        Ok(Some(Box::new(ReplayControl {
            state: Arc::clone(&self.state),
            target: index + 1,
            disabled: found.disabled || !has_following,
        })))
    }

    fn change_feed(&self) -> Option<watch::Receiver<String>> {
        Some(self.state.feed.subscribe())
    }
}

struct ReplayControl {
    state: Arc<ReplayState>,
    target: usize,
    disabled: bool,
}

#[async_trait]
impl PageControl for ReplayControl {
    fn is_disabled(&self) -> bool {
        self.disabled
    }

    async fn trigger(&self) -> HarvestResult<()> {
        if self.disabled {
            return Ok(());
        }
        {
            let mut current = self
                .state
                .current
                .lock()
                .map_err(|_| HarvestError::Widget("replay state lock poisoned".to_string()))?;
            *current = self.target;
        }
        self.state
            .feed
            .send_replace(self.state.page_signature(self.target));
        tracing::debug!("replay advanced to snapshot {}", self.target + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::PaginationDriver;
    use crate::types::StopReason;

    fn page(rows: &[(&str, &str)], next: &str) -> String {
        let body: String = rows
            .iter()
            .map(|(a, b)| format!("<tr><td>{a}</td><td>{b}</td></tr>"))
            .collect();
        format!(
            r#"<div class="dl-widget"><table><tbody>{body}</tbody></table>
               <div><span>Rows: 1-2 of 3</span><div><button>prev</button>{next}</div></div></div>"#
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_walks_all_snapshots() {
        let pages = vec![
            page(&[("A", "1"), ("B", "2")], "<button>next</button>"),
            page(&[("C", "3")], "<button disabled>next</button>"),
        ];
        let widget = ReplayWidget::new(pages, &HarvestConfig::default());
        let start = tokio::time::Instant::now();
        let report = PaginationDriver::default()
            .collect_all(&widget)
            .await
            .unwrap();

        assert_eq!(report.to_tsv(), "A\t1\nB\t2\nC\t3");
        assert_eq!(report.stop, StopReason::NoMorePages);
        assert_eq!(report.timed_out_transitions, 0);
        assert_eq!(widget.current_page(), 1);
        assert!(start.elapsed() < std::time::Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_last_snapshot_with_enabled_next_is_disabled() {
        let pages = vec![page(&[("A", "1")], "<button>next</button>")];
        let widget = ReplayWidget::new(pages, &HarvestConfig::default());
        let control = widget.next_control().await.unwrap().unwrap();
        assert!(control.is_disabled());
    }
}
