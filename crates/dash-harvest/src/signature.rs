//! Change detection for a table body.
//!
//! A signature is a bounded prefix of the body text. Waiting for a change
//! races a push feed of new signatures against a fixed timeout; without a
//! feed the wait degrades to sleeping for the full timeout.

use std::time::Duration;
use tokio::sync::watch;

/// How a wait for a page transition ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// A new, non-empty signature differing from the previous one was seen.
    Changed,
    /// The timeout elapsed first.
    TimedOut,
}

/// Truncate body text to its first `max_chars` characters.
pub fn signature(body_text: &str, max_chars: usize) -> String {
    match body_text.char_indices().nth(max_chars) {
        Some((idx, _)) => body_text[..idx].to_string(),
        None => body_text.to_string(),
    }
}

/// Wait until `feed` holds a signature other than `previous`, or `timeout` elapses.
///
/// The feed's current value counts, so a change published before the wait
/// started is not missed. A closed feed, or `None`, waits out the timeout.
pub async fn await_signature_change(
    feed: Option<watch::Receiver<String>>,
    previous: &str,
    timeout: Duration,
) -> ChangeOutcome {
    let Some(mut rx) = feed else {
        tokio::time::sleep(timeout).await;
        return ChangeOutcome::TimedOut;
    };

    let watch_changes = async {
        loop {
            {
                let current = rx.borrow_and_update();
                if !current.is_empty() && current.as_str() != previous {
                    return;
                }
            }
            if rx.changed().await.is_err() {
                // Sender dropped: no more notifications, fall back to the timer.
                std::future::pending::<()>().await;
            }
        }
    };

    match tokio::time::timeout(timeout, watch_changes).await {
        Ok(()) => ChangeOutcome::Changed,
        Err(_) => ChangeOutcome::TimedOut,
    }
}
