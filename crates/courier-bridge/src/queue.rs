//! Per-provider bridge request queue file.
//!
//! Each provider has one JSON list file. The dispatcher polls it; the
//! control surface appends to it. Reads fail soft: a missing or unparsable
//! file is treated as empty for that tick so one corrupt write can never
//! wedge the dispatcher. Writes are atomic (temp file then rename).

use std::path::PathBuf;

use uuid::Uuid;

use courier_types::{BridgeRequest, CourierError, Provider};

pub struct RequestQueue {
    provider: Provider,
    path: PathBuf,
}

impl RequestQueue {
    pub fn new(provider: Provider, path: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            path: path.into(),
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// All requests currently in the file. Missing or unparsable reads
    /// degrade to empty.
    pub fn load(&self) -> Vec<BridgeRequest> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "queue read failed");
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(requests) => requests,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "queue file unparsable, treating as empty");
                Vec::new()
            }
        }
    }

    /// Append a new unprocessed request and persist.
    pub fn append(
        &self,
        prompt: impl Into<String>,
        context: Option<String>,
    ) -> Result<BridgeRequest, CourierError> {
        let request = BridgeRequest::new(prompt, context);
        let mut requests = self.load();
        requests.push(request.clone());
        self.save(&requests)?;
        tracing::info!(provider = %self.provider, id = %request.id, "bridge request queued");
        Ok(request)
    }

    /// The earliest request whose `processed` flag is still false.
    pub fn first_unprocessed(&self) -> Option<BridgeRequest> {
        self.load().into_iter().find(|r| !r.processed)
    }

    /// Flip `processed` to true for the given id. Returns false if the id
    /// is not in the file.
    pub fn mark_processed(&self, id: Uuid) -> Result<bool, CourierError> {
        let mut requests = self.load();
        let Some(request) = requests.iter_mut().find(|r| r.id == id) else {
            return Ok(false);
        };
        request.processed = true;
        self.save(&requests)?;
        Ok(true)
    }

    fn save(&self, requests: &[BridgeRequest]) -> Result<(), CourierError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CourierError::Store(format!("create {}: {e}", parent.display())))?;
        }
        let json = serde_json::to_string_pretty(requests)
            .map_err(|e| CourierError::Store(format!("serialize queue: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| CourierError::Store(format!("write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| CourierError::Store(format!("rename {}: {e}", self.path.display())))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_in(dir: &std::path::Path) -> RequestQueue {
        RequestQueue::new(Provider::ChatGpt, dir.join("bridge_queue_chatgpt.json"))
    }

    #[test]
    fn missing_file_loads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let queue = queue_in(tmp.path());
        assert!(queue.load().is_empty());
        assert!(queue.first_unprocessed().is_none());
    }

    #[test]
    fn unparsable_file_degrades_to_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let queue = queue_in(tmp.path());
        std::fs::write(tmp.path().join("bridge_queue_chatgpt.json"), "{garbage").unwrap();
        assert!(queue.load().is_empty());
    }

    #[test]
    fn append_then_first_unprocessed_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let queue = queue_in(tmp.path());
        let a = queue.append("first", None).unwrap();
        let _b = queue.append("second", None).unwrap();

        let next = queue.first_unprocessed().unwrap();
        assert_eq!(next.id, a.id);
        assert_eq!(next.prompt, "first");
        assert!(!next.processed);
    }

    #[test]
    fn mark_processed_advances_the_queue() {
        let tmp = tempfile::tempdir().unwrap();
        let queue = queue_in(tmp.path());
        let a = queue.append("first", None).unwrap();
        let b = queue.append("second", None).unwrap();

        assert!(queue.mark_processed(a.id).unwrap());
        assert_eq!(queue.first_unprocessed().unwrap().id, b.id);

        assert!(queue.mark_processed(b.id).unwrap());
        assert!(queue.first_unprocessed().is_none());
    }

    #[test]
    fn mark_processed_unknown_id_is_false() {
        let tmp = tempfile::tempdir().unwrap();
        let queue = queue_in(tmp.path());
        queue.append("only", None).unwrap();
        assert!(!queue.mark_processed(Uuid::now_v7()).unwrap());
    }

    #[test]
    fn context_round_trips_through_the_file() {
        let tmp = tempfile::tempdir().unwrap();
        let queue = queue_in(tmp.path());
        queue
            .append("prompt", Some("background info".to_string()))
            .unwrap();
        let loaded = queue.load();
        assert_eq!(loaded[0].context.as_deref(), Some("background info"));
        assert_eq!(loaded[0].full_prompt(), "background info\n\nprompt");
    }
}
