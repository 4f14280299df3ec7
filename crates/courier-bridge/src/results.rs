//! Shared bridge result map, keyed by request id.
//!
//! Both dispatchers write into the same file, and results are immutable:
//! `record` is check-and-set, so a request that already has a result is
//! never overwritten. The dispatcher relies on that when it heals from a
//! crash between result-write and processed-flip.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use uuid::Uuid;

use courier_types::{BridgeResult, CourierError};

/// One shared instance must front the file: `record` serializes its
/// load-insert-save through the internal lock, so writers racing on
/// separate instances can still clobber each other.
pub struct ResultStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// The whole map. Missing or unparsable reads degrade to empty.
    pub fn load(&self) -> HashMap<Uuid, BridgeResult> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "results read failed");
                return HashMap::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "results file unparsable, treating as empty");
                HashMap::new()
            }
        }
    }

    pub fn get(&self, id: Uuid) -> Option<BridgeResult> {
        self.load().remove(&id)
    }

    /// Record a result unless one already exists for the id. Returns
    /// whether the write happened.
    pub fn record(&self, id: Uuid, result: BridgeResult) -> Result<bool, CourierError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| CourierError::Store("results lock poisoned".to_string()))?;
        let mut results = self.load();
        if results.contains_key(&id) {
            tracing::debug!(id = %id, "result already recorded, keeping the original");
            return Ok(false);
        }
        results.insert(id, result);
        self.save(&results)?;
        Ok(true)
    }

    fn save(&self, results: &HashMap<Uuid, BridgeResult>) -> Result<(), CourierError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CourierError::Store(format!("create {}: {e}", parent.display())))?;
        }
        let json = serde_json::to_string_pretty(results)
            .map_err(|e| CourierError::Store(format!("serialize results: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| CourierError::Store(format!("write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| CourierError::Store(format!("rename {}: {e}", self.path.display())))?;
        Ok(())
    }
}
