//! Browser automation for chat providers over the Chrome DevTools Protocol.
//!
//! Layers, bottom to top:
//!
//! - **`cdp`**: WebSocket JSON-RPC transport with command/reply correlation
//!   and an event channel.
//! - **`driver`**: page operations (navigate, evaluate, selector probes,
//!   click, Enter).
//! - **`launch`**: Chrome/Chromium discovery, launch with a persistent
//!   profile, and DevTools page-target discovery.
//! - **`provider`**: the per-provider URLs and CSS selectors.
//! - **`session`**: one lazily-created, health-checked session per provider;
//!   prompt submission.
//! - **`stability`**: reply completion detection by consecutive-stable-poll
//!   debouncing with a hard ceiling.
//!
//! The browser is launched with `--remote-debugging-port` and a persistent
//! `--user-data-dir`, so an operator logs in once by hand and the session
//! survives restarts. There is no login automation.

pub mod cdp;
pub mod driver;
pub mod error;
pub mod launch;
pub mod provider;
pub mod session;
pub mod stability;

pub use driver::PageDriver;
pub use error::BrowserError;
pub use session::{ProviderSession, SessionConfig, SessionManager};
pub use stability::{await_reply, Outcome, ResponsePage, StabilityConfig, NO_RESPONSE_SENTINEL};
