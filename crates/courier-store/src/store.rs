//! The state document and its disk lifecycle.
//!
//! Every mutation is read-modify-write against the in-memory document;
//! callers decide when to `persist()`. Persistence is atomic: write to a
//! temp file, then rename over the target, so a crash mid-write never
//! truncates the store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use courier_types::{CommandResult, CourierError, LogEntry, LogLevel, QueueItem};

/// The log keeps only the most recent entries; oldest are evicted first.
pub const MAX_LOG_ENTRIES: usize = 10_000;

/// The on-disk shape of the state store.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StateDocument {
    #[serde(default)]
    pub queue: Vec<QueueItem>,
    #[serde(default)]
    pub log: Vec<LogEntry>,
    #[serde(default)]
    pub results: HashMap<Uuid, CommandResult>,
}

/// In-memory state plus the file it persists to.
pub struct StateStore {
    path: PathBuf,
    doc: StateDocument,
}

impl StateStore {
    /// Open the store at `path`. A missing file loads as the empty document;
    /// an unparsable file is an error (the operator should inspect it rather
    /// than have the daemon silently discard queue state).
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CourierError> {
        let path = path.into();
        let doc = match std::fs::read_to_string(&path) {
            Ok(data) => serde_json::from_str(&data).map_err(|e| {
                CourierError::Store(format!(
                    "failed to parse state file {}: {e}",
                    path.display()
                ))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StateDocument::default(),
            Err(e) => {
                return Err(CourierError::Store(format!(
                    "failed to read state file {}: {e}",
                    path.display()
                )))
            }
        };
        Ok(Self { path, doc })
    }

    /// Write the document to disk atomically (temp file + rename).
    pub fn persist(&self) -> Result<(), CourierError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CourierError::Store(format!("failed to create state dir: {e}")))?;
        }
        let json = serde_json::to_string_pretty(&self.doc)
            .map_err(|e| CourierError::Store(format!("failed to serialize state: {e}")))?;

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, json.as_bytes())
            .map_err(|e| CourierError::Store(format!("failed to write state temp file: {e}")))?;
        std::fs::rename(&tmp_path, &self.path)
            .map_err(|e| CourierError::Store(format!("failed to rename state file: {e}")))?;
        tracing::debug!(path = %self.path.display(), queue = self.doc.queue.len(), "state persisted");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // -----------------------------------------------------------------------
    // Queue
    // -----------------------------------------------------------------------

    /// Append an item to the queue. The queue is append-only.
    pub fn push_item(&mut self, item: QueueItem) {
        self.doc.queue.push(item);
    }

    pub fn item(&self, id: Uuid) -> Option<&QueueItem> {
        self.doc.queue.iter().find(|i| i.id == id)
    }

    pub fn item_mut(&mut self, id: Uuid) -> Option<&mut QueueItem> {
        self.doc.queue.iter_mut().find(|i| i.id == id)
    }

    pub fn queue(&self) -> &[QueueItem] {
        &self.doc.queue
    }

    /// The first item in insertion order that is approved and has no result
    /// yet. Items are never removed; result presence marks completion.
    pub fn next_eligible(&self) -> Option<&QueueItem> {
        self.doc
            .queue
            .iter()
            .find(|i| i.approved == Some(true) && !self.doc.results.contains_key(&i.id))
    }

    // -----------------------------------------------------------------------
    // Results
    // -----------------------------------------------------------------------

    /// Record a result for an item. At most one result per id: recording
    /// over an existing result is rejected and the original is kept.
    pub fn record_result(&mut self, result: CommandResult) -> Result<(), CourierError> {
        if self.doc.results.contains_key(&result.id) {
            return Err(CourierError::BadRequest(format!(
                "a result already exists for item {}",
                result.id
            )));
        }
        self.doc.results.insert(result.id, result);
        Ok(())
    }

    pub fn result(&self, id: Uuid) -> Option<&CommandResult> {
        self.doc.results.get(&id)
    }

    pub fn results(&self) -> &HashMap<Uuid, CommandResult> {
        &self.doc.results
    }

    // -----------------------------------------------------------------------
    // Log
    // -----------------------------------------------------------------------

    /// Append a log entry, evicting the oldest past [`MAX_LOG_ENTRIES`].
    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        self.doc.log.push(LogEntry {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        });
        if self.doc.log.len() > MAX_LOG_ENTRIES {
            let excess = self.doc.log.len() - MAX_LOG_ENTRIES;
            self.doc.log.drain(..excess);
        }
    }

    /// The `n` most recent log entries, oldest first.
    pub fn log_tail(&self, n: usize) -> &[LogEntry] {
        let len = self.doc.log.len();
        &self.doc.log[len.saturating_sub(n)..]
    }
}
