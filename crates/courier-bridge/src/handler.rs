//! The dispatcher's seam to the browser.
//!
//! [`RequestHandler`] is what a dispatcher calls to turn a request into
//! response text. The production implementation drives a browser session;
//! tests script their own.

use async_trait::async_trait;

use courier_browser::{await_reply, Outcome, SessionConfig, SessionManager, StabilityConfig};
use courier_types::{BridgeRequest, CourierError};

#[async_trait]
pub trait RequestHandler: Send {
    /// Produce the response text for one request.
    async fn handle(&mut self, request: &BridgeRequest) -> Result<String, CourierError>;

    /// Release any held resources on dispatcher shutdown.
    async fn close(&mut self);
}

/// Drives a real provider chat session.
pub struct BrowserHandler {
    sessions: SessionManager,
    stability: StabilityConfig,
}

impl BrowserHandler {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: SessionManager::new(config),
            stability: StabilityConfig::default(),
        }
    }

    pub fn with_stability(mut self, stability: StabilityConfig) -> Self {
        self.stability = stability;
        self
    }
}

#[async_trait]
impl RequestHandler for BrowserHandler {
    async fn handle(&mut self, request: &BridgeRequest) -> Result<String, CourierError> {
        let session = self
            .sessions
            .ensure()
            .await
            .map_err(|e| CourierError::Bridge(e.to_string()))?;

        let baseline = session
            .submit(&request.full_prompt())
            .await
            .map_err(|e| CourierError::Bridge(e.to_string()))?;

        let outcome = await_reply(session, baseline, &self.stability)
            .await
            .map_err(|e| CourierError::Bridge(e.to_string()))?;

        // A timeout still yields the best text seen; it is an answer of
        // record, not an error.
        match outcome {
            Outcome::Complete(text) => Ok(text),
            Outcome::TimedOut(text) => {
                tracing::warn!(id = %request.id, "reply never stabilized, recording partial text");
                Ok(text)
            }
        }
    }

    async fn close(&mut self) {
        self.sessions.close().await;
    }
}
