//! Whitelist validator for the courier broker.
//!
//! A small rule set of `{command, argument-prefix}` pairs gates every shell
//! execution. Prefix matching (rather than exact-args matching) lets an
//! operator whitelist `git status` once and still allow `git status --short`
//! while never allowing `git push` under the same entry.
//!
//! The validator has no notion of path traversal, shell metacharacters, or
//! environment. Callers must pass a pre-tokenized argument vector, never a
//! raw shell string; that is a hard invariant of the executor's calling
//! convention, not of the validator.

pub mod builtin;
pub mod engine;

pub use engine::Whitelist;
