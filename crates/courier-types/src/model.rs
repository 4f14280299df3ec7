//! Data model for the command queue and the browser bridge.
//!
//! Everything here serializes to the camelCase JSON documents the daemon
//! keeps on disk. The files are plain JSON and are expected to be inspected
//! (or hand-edited, with the process stopped) by an operator, so field names
//! stay human-friendly.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The only work kind the executor currently understands.
pub const WORK_SHELL: &str = "shell";

/// One unit of queued shell work.
///
/// The queue is append-only: completion is tracked by the presence of a
/// [`CommandResult`] for the item's id, never by deleting the item.
/// `approved` is tri-state (unknown / true / false) and must round-trip
/// losslessly, hence `Option<bool>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    /// Generation-ordered unique id (UUIDv7).
    pub id: Uuid,
    /// Work kind. Only `"shell"` has an executor; other kinds may be
    /// enqueued and approved but nothing acts on them yet.
    #[serde(rename = "type")]
    pub kind: String,
    /// Raw payload. Shape is validated at execution time, not at enqueue.
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    /// Tri-state approval: `None` = not yet decided.
    pub approved: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
}

impl QueueItem {
    /// Create a fresh, undecided item.
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind: kind.into(),
            payload,
            created_at: Utc::now(),
            approved: None,
            approved_by: None,
            approved_at: None,
        }
    }
}

/// Payload of a `"shell"` queue item, parsed at execution time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellPayload {
    pub cmd: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
}

/// A whitelist rule: this exact command name, with arguments matching this
/// positional prefix. An empty `args` list accepts any arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    pub cmd: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl WhitelistEntry {
    pub fn new(cmd: impl Into<String>, args: &[&str]) -> Self {
        Self {
            cmd: cmd.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Severity of a broker log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Append-only observational log entry. Never read by control logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Outcome of one shell execution, keyed by the originating item id.
/// Immutable once written; at most one per id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub id: Uuid,
    pub cmd: String,
    pub args: Vec<String>,
    /// Process exit code, or -1 for spawn failure / timeout.
    pub code: i64,
    pub out: String,
    pub err: String,
    pub ts: DateTime<Utc>,
}

/// A chat provider the bridge can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    ChatGpt,
    Claude,
}

impl Provider {
    /// All providers, in dispatch order.
    pub const ALL: [Provider; 2] = [Provider::ChatGpt, Provider::Claude];

    /// Stable key used in file names and wire payloads.
    pub fn key(self) -> &'static str {
        match self {
            Provider::ChatGpt => "chatgpt",
            Provider::Claude => "claude",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chatgpt" => Ok(Provider::ChatGpt),
            "claude" => Ok(Provider::Claude),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

/// One natural-language request in a provider's bridge queue file.
///
/// `processed` flips from false to true exactly once, and only after a
/// [`BridgeResult`] has been durably written for the same id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeRequest {
    pub id: Uuid,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub processed: bool,
    pub timestamp: DateTime<Utc>,
}

impl BridgeRequest {
    pub fn new(prompt: impl Into<String>, context: Option<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            prompt: prompt.into(),
            context,
            processed: false,
            timestamp: Utc::now(),
        }
    }

    /// The text actually sent to the provider: context first, then prompt.
    pub fn full_prompt(&self) -> String {
        match &self.context {
            Some(ctx) if !ctx.is_empty() => format!("{ctx}\n\n{}", self.prompt),
            _ => self.prompt.clone(),
        }
    }
}

/// The extracted answer for a bridge request, stored in the shared result
/// map keyed by the request id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeResult {
    #[serde(rename = "type")]
    pub kind: Provider,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}
