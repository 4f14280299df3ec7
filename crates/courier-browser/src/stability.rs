//! Reply completion detection.
//!
//! The chat pages stream their replies into the DOM, so "done" has to be
//! inferred: the latest reply text must be non-empty, identical across
//! consecutive polls, and the page's busy indicator must be absent. Only
//! when that holds for the required number of consecutive polls is the
//! reply considered complete. Any change resets the count.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::BrowserError;

/// Recorded when the ceiling expires with nothing ever extracted.
pub const NO_RESPONSE_SENTINEL: &str = "no response received";

/// The detector's view of a chat page. Implemented by the live session and
/// by scripted fakes in tests.
#[async_trait]
pub trait ResponsePage {
    /// Is the page still generating?
    async fn busy(&mut self) -> Result<bool, BrowserError>;

    /// The text of the newest assistant reply that appeared after
    /// `baseline` pre-existing replies, if one exists yet.
    async fn latest_reply(&mut self, baseline: usize) -> Result<Option<String>, BrowserError>;
}

#[derive(Debug, Clone)]
pub struct StabilityConfig {
    /// Poll cadence.
    pub poll_interval: Duration,
    /// Consecutive unchanged, not-busy polls required to call it complete.
    pub required_stable_polls: u32,
    /// Hard ceiling on the whole wait.
    pub ceiling: Duration,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            required_stable_polls: 2,
            ceiling: Duration::from_secs(120),
        }
    }
}

/// How the wait ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The reply settled.
    Complete(String),
    /// The ceiling expired; carries the best text seen, or the sentinel.
    TimedOut(String),
}

impl Outcome {
    pub fn text(&self) -> &str {
        match self {
            Outcome::Complete(t) | Outcome::TimedOut(t) => t,
        }
    }
}

/// Poll until the newest reply stabilizes or the ceiling expires.
pub async fn await_reply<P: ResponsePage + ?Sized>(
    page: &mut P,
    baseline: usize,
    cfg: &StabilityConfig,
) -> Result<Outcome, BrowserError> {
    let deadline = tokio::time::Instant::now() + cfg.ceiling;
    let mut last_text = String::new();
    let mut stable: u32 = 0;

    loop {
        if let Some(text) = page.latest_reply(baseline).await? {
            if !text.is_empty() && text == last_text && !page.busy().await? {
                stable += 1;
                if stable >= cfg.required_stable_polls {
                    tracing::debug!(chars = text.len(), "reply stabilized");
                    return Ok(Outcome::Complete(text));
                }
            } else {
                stable = 0;
                last_text = text;
            }
        }

        let now = tokio::time::Instant::now();
        if now >= deadline {
            tracing::warn!(ceiling = ?cfg.ceiling, "reply wait hit the ceiling");
            let best = if last_text.is_empty() {
                NO_RESPONSE_SENTINEL.to_string()
            } else {
                last_text
            };
            return Ok(Outcome::TimedOut(best));
        }
        tokio::time::sleep_until((now + cfg.poll_interval).min(deadline)).await;
    }
}
