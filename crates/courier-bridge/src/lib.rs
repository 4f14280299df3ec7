//! File-based bridge between the control surface and browser-driven chat
//! providers.
//!
//! The control surface appends [`courier_types::BridgeRequest`]s to a
//! per-provider queue file; a [`Dispatcher`] per provider polls its file,
//! drives the browser through a [`RequestHandler`], and records the answer
//! in the shared [`ResultStore`] before flipping the request's processed
//! flag. The files are plain JSON so an operator (or another process) can
//! inspect and append to them directly.

pub mod dispatcher;
pub mod handler;
pub mod queue;
pub mod results;

pub use dispatcher::{Dispatcher, DEFAULT_TICK};
pub use handler::{BrowserHandler, RequestHandler};
pub use queue::RequestQueue;
pub use results::ResultStore;
