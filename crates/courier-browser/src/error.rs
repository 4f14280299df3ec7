//! Error types for browser automation.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while driving a browser over CDP.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Failed to establish a WebSocket connection to the DevTools endpoint.
    #[error("failed to connect to DevTools at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// A CDP command returned an error reply.
    #[error("CDP error {code}: {message}")]
    Cdp { code: i64, message: String },

    /// A CDP command received no reply within its deadline.
    #[error("CDP command '{method}' timed out after {duration:?}")]
    CommandTimeout { method: String, duration: Duration },

    /// Serialization failure or an unexpected wire message.
    #[error("CDP protocol error: {detail}")]
    Protocol { detail: String },

    /// No element matched the selector.
    #[error("element not found: {selector}")]
    ElementNotFound { selector: String },

    /// `Page.navigate` reported a load error.
    #[error("navigation failed: {reason}")]
    NavigationFailed { reason: String },

    /// Evaluated JavaScript threw.
    #[error("JavaScript exception: {message}")]
    JsException { message: String },

    /// The page did not finish loading within the deadline.
    #[error("page load timed out after {duration:?}")]
    PageLoadTimeout { duration: Duration },

    /// No Chrome or Chromium binary was found on this system.
    #[error("no Chrome or Chromium binary found on this system")]
    NoBrowserFound,

    /// The browser process could not be started.
    #[error("failed to launch browser at {path}: {reason}")]
    LaunchFailed { path: String, reason: String },

    /// The DevTools endpoint never exposed a page target.
    #[error("no page target appeared on DevTools port {port} within {duration:?}")]
    NoPageTarget { port: u16, duration: Duration },
}
