//! Per-provider dispatch loop.
//!
//! One dispatcher task per provider polls that provider's queue file on a
//! fixed tick, hands the earliest unprocessed request to its handler, and
//! records the outcome. Ordering invariant: the result is durably written
//! before the request's `processed` flag flips. A crash in the gap re-picks
//! the same request on restart, finds the existing result, and just flips
//! the flag without a second browser call.
//!
//! Handler failures are recorded as response text, never raised, so one bad
//! request cannot starve the queue.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use courier_types::{BridgeResult, CourierError, Provider};

use crate::handler::RequestHandler;
use crate::queue::RequestQueue;
use crate::results::ResultStore;

/// Default queue poll cadence.
pub const DEFAULT_TICK: Duration = Duration::from_secs(3);

pub struct Dispatcher<H: RequestHandler> {
    provider: Provider,
    queue: RequestQueue,
    // Shared with the other dispatcher and the control surface; all writes
    // to the result file go through this one instance.
    results: Arc<ResultStore>,
    handler: H,
    tick: Duration,
}

impl<H: RequestHandler> Dispatcher<H> {
    pub fn new(queue: RequestQueue, results: Arc<ResultStore>, handler: H) -> Self {
        Self {
            provider: queue.provider(),
            queue,
            results,
            handler,
            tick: DEFAULT_TICK,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Poll until the shutdown channel flips to true, then close the handler.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(provider = %self.provider, tick = ?self.tick, "dispatcher started");
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick_once().await {
                        tracing::error!(provider = %self.provider, error = %e, "dispatch tick failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.handler.close().await;
        tracing::info!(provider = %self.provider, "dispatcher stopped");
    }

    /// Process at most one request. Returns whether anything was done.
    pub async fn tick_once(&mut self) -> Result<bool, CourierError> {
        let Some(request) = self.queue.first_unprocessed() else {
            return Ok(false);
        };

        // Crash healing: a result already on disk means the previous run
        // died between result-write and flag-flip.
        if self.results.get(request.id).is_some() {
            tracing::info!(provider = %self.provider, id = %request.id, "result already recorded, flipping flag");
            self.queue.mark_processed(request.id)?;
            return Ok(true);
        }

        tracing::info!(provider = %self.provider, id = %request.id, "dispatching request");
        let response = match self.handler.handle(&request).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(provider = %self.provider, id = %request.id, error = %e, "handler failed, recording error text");
                format!("[error] {e}")
            }
        };

        let result = BridgeResult {
            kind: self.provider,
            response,
            timestamp: Utc::now(),
        };
        // Result first, then the flag. Never the other way around.
        self.results.record(request.id, result)?;
        self.queue.mark_processed(request.id)?;
        Ok(true)
    }
}
