//! Command queue broker with whitelist-gated execution.
//!
//! The broker exposes the control surface's queue operations (enqueue,
//! approve, next, list, log, results) over the durable state store, and
//! enforces both the approval flag and the whitelist before any shell
//! command is spawned. Execution captures stdout/stderr/exit code and
//! records a single immutable result per item id.

pub mod broker;
pub mod executor;

pub use broker::Broker;
pub use executor::{run_shell, ExecOutcome, ExecutorConfig};
