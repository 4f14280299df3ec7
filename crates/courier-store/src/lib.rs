//! Durable state store for the command queue broker.
//!
//! A single JSON document on disk holds the append-only command queue, a
//! bounded observational log, and the result map keyed by item id. The store
//! owns one in-memory representation plus an explicit `persist()`/`load()`
//! pair; it is constructed once and injected into the broker, never
//! referenced as ambient global state.

pub mod store;

pub use store::{StateDocument, StateStore, MAX_LOG_ENTRIES};
