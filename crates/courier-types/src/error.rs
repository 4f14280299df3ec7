//! Error types shared across all courier crates.

/// Errors that can occur across the courier runtime.
///
/// `NotFound`, `Forbidden`, and `BadRequest` are structural: they surface
/// synchronously to the control-surface caller and never enter the state
/// store. Execution-domain failures (spawn errors, bridge navigation
/// failures, detector timeouts) are recorded as ordinary result payloads
/// instead of being raised, so callers observe them through the normal
/// result-polling path.
#[derive(Debug, thiserror::Error)]
pub enum CourierError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("state store error: {0}")]
    Store(String),

    #[error("bridge error: {0}")]
    Bridge(String),

    #[error("configuration error: {0}")]
    Config(String),
}
