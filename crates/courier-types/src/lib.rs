//! Core types shared across all courier crates.
//!
//! Defines the queue/result data model, the bridge request/response model,
//! the error taxonomy, and the per-user state directory layout used by the
//! store, policy, broker, bridge, and daemon crates.

pub mod error;
pub mod model;
pub mod paths;

pub use error::CourierError;
pub use model::{
    BridgeRequest, BridgeResult, CommandResult, LogEntry, LogLevel, Provider, QueueItem,
    ShellPayload, WhitelistEntry, WORK_SHELL,
};
pub use paths::{StatePaths, DEFAULT_PORT, PORT_ENV_VAR};
