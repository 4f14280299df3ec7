//! The command queue broker.
//!
//! The broker owns the state store and the whitelist, threading every
//! control-surface queue operation through them. All mutations persist the
//! store before returning, so the queue survives process restarts and
//! approval can happen asynchronously relative to enqueue.

use chrono::Utc;
use uuid::Uuid;

use courier_policy::Whitelist;
use courier_store::StateStore;
use courier_types::{
    CommandResult, CourierError, LogEntry, LogLevel, QueueItem, ShellPayload, WhitelistEntry,
    WORK_SHELL,
};

use crate::executor::{run_shell, ExecutorConfig};

pub struct Broker {
    store: StateStore,
    whitelist: Whitelist,
    executor: ExecutorConfig,
}

impl Broker {
    pub fn new(store: StateStore, whitelist: Whitelist) -> Self {
        Self {
            store,
            whitelist,
            executor: ExecutorConfig::default(),
        }
    }

    pub fn with_executor_config(mut self, executor: ExecutorConfig) -> Self {
        self.executor = executor;
        self
    }

    // -----------------------------------------------------------------------
    // Queue operations
    // -----------------------------------------------------------------------

    /// Append a new item with undecided approval. Payload shape is not
    /// validated here; stricter validation happens at execution time.
    pub fn enqueue(
        &mut self,
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<QueueItem, CourierError> {
        if kind.is_empty() {
            return Err(CourierError::BadRequest("missing 'type'".into()));
        }
        if payload.is_null() {
            return Err(CourierError::BadRequest("missing 'payload'".into()));
        }

        let item = QueueItem::new(kind, payload);
        self.store.push_item(item.clone());
        self.store
            .log(LogLevel::Info, format!("enqueued {} item {}", kind, item.id));
        self.store.persist()?;
        tracing::info!(id = %item.id, kind, "item enqueued");
        Ok(item)
    }

    /// Set the tri-state approval flag. Later calls may overwrite the
    /// decision, but a completed item is never re-run: `next()` and
    /// `execute_now` both consult the results map.
    pub fn approve(
        &mut self,
        id: Uuid,
        approved: bool,
        by: &str,
    ) -> Result<QueueItem, CourierError> {
        let item = self
            .store
            .item_mut(id)
            .ok_or_else(|| CourierError::NotFound(format!("no queue item {id}")))?;
        item.approved = Some(approved);
        item.approved_by = Some(by.to_string());
        item.approved_at = Some(Utc::now());
        let snapshot = item.clone();

        self.store.log(
            LogLevel::Info,
            format!("item {id} {} by {by}", if approved { "approved" } else { "rejected" }),
        );
        self.store.persist()?;
        tracing::info!(id = %id, approved, by, "approval recorded");
        Ok(snapshot)
    }

    /// The first approved, not-yet-completed item in insertion order.
    /// Does not remove the item; completion is tracked by result presence.
    pub fn next(&self) -> Option<QueueItem> {
        self.store.next_eligible().cloned()
    }

    pub fn list(&self) -> Vec<QueueItem> {
        self.store.queue().to_vec()
    }

    pub fn log_tail(&self, n: usize) -> Vec<LogEntry> {
        self.store.log_tail(n).to_vec()
    }

    pub fn results(&self) -> Vec<CommandResult> {
        let mut results: Vec<CommandResult> = self.store.results().values().cloned().collect();
        results.sort_by_key(|r| r.id);
        results
    }

    pub fn result(&self, id: Uuid) -> Option<CommandResult> {
        self.store.result(id).cloned()
    }

    // -----------------------------------------------------------------------
    // Whitelist
    // -----------------------------------------------------------------------

    pub fn whitelist_entries(&self) -> Vec<WhitelistEntry> {
        self.whitelist.entries().to_vec()
    }

    /// Full replacement of the whitelist, persisted to its own file.
    pub fn replace_whitelist(&mut self, entries: Vec<WhitelistEntry>) -> Result<(), CourierError> {
        self.whitelist.replace(entries)?;
        self.store
            .log(LogLevel::Info, "whitelist replaced".to_string());
        self.store.persist()?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Execute an approved, whitelisted shell item now and record its result.
    ///
    /// Preconditions, checked in order:
    /// - the item exists (`NotFound`)
    /// - the item is of type `shell` with a well-formed payload (`BadRequest`)
    /// - no result exists yet for the id (`BadRequest`), since an item gets
    ///   at most one result, ever
    /// - `approved == Some(true)` and the whitelist allows the argv
    ///   (`Forbidden`)
    ///
    /// A precondition failure writes no result. Execution-domain failures
    /// (spawn error, timeout, non-zero exit) are recorded in the result.
    pub async fn execute_now(&mut self, id: Uuid) -> Result<CommandResult, CourierError> {
        let item = self
            .store
            .item(id)
            .ok_or_else(|| CourierError::NotFound(format!("no queue item {id}")))?;

        if item.kind != WORK_SHELL {
            return Err(CourierError::BadRequest(format!(
                "item {id} has type '{}', only 'shell' is executable",
                item.kind
            )));
        }

        let payload: ShellPayload = serde_json::from_value(item.payload.clone())
            .map_err(|e| CourierError::BadRequest(format!("malformed shell payload: {e}")))?;

        if self.store.result(id).is_some() {
            return Err(CourierError::BadRequest(format!(
                "item {id} already has a result"
            )));
        }

        if item.approved != Some(true) {
            self.store
                .log(LogLevel::Warn, format!("execution of {id} refused: not approved"));
            self.store.persist()?;
            return Err(CourierError::Forbidden(format!("item {id} is not approved")));
        }

        if !self.whitelist.is_allowed(&payload.cmd, &payload.args) {
            self.store.log(
                LogLevel::Warn,
                format!("execution of {id} refused: '{}' not whitelisted", payload.cmd),
            );
            self.store.persist()?;
            return Err(CourierError::Forbidden(format!(
                "'{}' with these arguments is not whitelisted",
                payload.cmd
            )));
        }

        tracing::info!(id = %id, cmd = %payload.cmd, "executing shell item");
        let outcome = run_shell(&payload, &self.executor).await;

        let result = CommandResult {
            id,
            cmd: payload.cmd,
            args: payload.args,
            code: outcome.code,
            out: outcome.out,
            err: outcome.err,
            ts: Utc::now(),
        };
        self.store.record_result(result.clone())?;
        self.store.log(
            LogLevel::Info,
            format!("item {id} executed, exit code {}", result.code),
        );
        self.store.persist()?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_policy::Whitelist;

    fn test_broker(entries: Vec<WhitelistEntry>) -> (tempfile::TempDir, Broker) {
        let tmp = tempfile::tempdir().unwrap();
        let store = StateStore::open(tmp.path().join("state.json")).unwrap();
        let whitelist = Whitelist::from_entries(entries, tmp.path().join("whitelist.json"));
        (tmp, Broker::new(store, whitelist))
    }

    fn shell_payload(cmd: &str, args: &[&str]) -> serde_json::Value {
        serde_json::json!({ "cmd": cmd, "args": args })
    }

    #[test]
    fn enqueue_defaults_to_undecided() {
        let (_tmp, mut broker) = test_broker(vec![]);
        let item = broker.enqueue(WORK_SHELL, shell_payload("ls", &[])).unwrap();
        assert_eq!(item.approved, None);
        assert!(item.approved_by.is_none());
        assert_eq!(broker.list().len(), 1);
    }

    #[test]
    fn enqueue_requires_type_and_payload() {
        let (_tmp, mut broker) = test_broker(vec![]);
        assert!(matches!(
            broker.enqueue("", shell_payload("ls", &[])),
            Err(CourierError::BadRequest(_))
        ));
        assert!(matches!(
            broker.enqueue(WORK_SHELL, serde_json::Value::Null),
            Err(CourierError::BadRequest(_))
        ));
    }

    #[test]
    fn approve_unknown_id_is_not_found() {
        let (_tmp, mut broker) = test_broker(vec![]);
        let err = broker.approve(Uuid::now_v7(), true, "operator").unwrap_err();
        assert!(matches!(err, CourierError::NotFound(_)));
    }

    #[test]
    fn approve_sets_flag_by_and_timestamp() {
        let (_tmp, mut broker) = test_broker(vec![]);
        let item = broker.enqueue(WORK_SHELL, shell_payload("ls", &[])).unwrap();
        let approved = broker.approve(item.id, true, "operator").unwrap();
        assert_eq!(approved.approved, Some(true));
        assert_eq!(approved.approved_by.as_deref(), Some("operator"));
        assert!(approved.approved_at.is_some());

        // A later call may overwrite the decision.
        let rejected = broker.approve(item.id, false, "auditor").unwrap();
        assert_eq!(rejected.approved, Some(false));
        assert_eq!(rejected.approved_by.as_deref(), Some("auditor"));
    }

    #[test]
    fn approving_non_shell_items_is_legal() {
        let (_tmp, mut broker) = test_broker(vec![]);
        let item = broker
            .enqueue("notify", serde_json::json!({"channel": "desk"}))
            .unwrap();
        let approved = broker.approve(item.id, true, "operator").unwrap();
        assert_eq!(approved.approved, Some(true));
    }

    #[tokio::test]
    async fn next_returns_approved_in_order_and_skips_completed() {
        let (_tmp, mut broker) = test_broker(vec![WhitelistEntry::new("echo", &[])]);
        let a = broker.enqueue(WORK_SHELL, shell_payload("echo", &["a"])).unwrap();
        let b = broker.enqueue(WORK_SHELL, shell_payload("echo", &["b"])).unwrap();

        assert!(broker.next().is_none(), "nothing approved yet");

        broker.approve(b.id, true, "op").unwrap();
        broker.approve(a.id, true, "op").unwrap();
        // Insertion order, not approval order.
        assert_eq!(broker.next().unwrap().id, a.id);

        broker.execute_now(a.id).await.unwrap();
        assert_eq!(broker.next().unwrap().id, b.id);

        broker.execute_now(b.id).await.unwrap();
        assert!(broker.next().is_none(), "completed ids never return");
    }

    #[tokio::test]
    async fn execute_unapproved_is_forbidden_and_writes_no_result() {
        let (_tmp, mut broker) = test_broker(vec![WhitelistEntry::new("ls", &[])]);
        let item = broker.enqueue(WORK_SHELL, shell_payload("ls", &["-la"])).unwrap();

        let err = broker.execute_now(item.id).await.unwrap_err();
        assert!(matches!(err, CourierError::Forbidden(_)));
        assert!(broker.result(item.id).is_none());

        // Explicit rejection is equally forbidden.
        broker.approve(item.id, false, "op").unwrap();
        let err = broker.execute_now(item.id).await.unwrap_err();
        assert!(matches!(err, CourierError::Forbidden(_)));
        assert!(broker.result(item.id).is_none());
    }

    #[tokio::test]
    async fn execute_unwhitelisted_is_forbidden_and_writes_no_result() {
        let (_tmp, mut broker) = test_broker(vec![WhitelistEntry::new("ls", &[])]);
        let item = broker
            .enqueue(WORK_SHELL, shell_payload("rm", &["-rf", "/"]))
            .unwrap();
        broker.approve(item.id, true, "op").unwrap();

        let err = broker.execute_now(item.id).await.unwrap_err();
        assert!(matches!(err, CourierError::Forbidden(_)));
        assert!(broker.result(item.id).is_none());
    }

    #[tokio::test]
    async fn execute_non_shell_is_bad_request() {
        let (_tmp, mut broker) = test_broker(vec![]);
        let item = broker
            .enqueue("notify", serde_json::json!({"channel": "desk"}))
            .unwrap();
        broker.approve(item.id, true, "op").unwrap();
        let err = broker.execute_now(item.id).await.unwrap_err();
        assert!(matches!(err, CourierError::BadRequest(_)));
    }

    #[tokio::test]
    async fn execute_malformed_payload_is_bad_request() {
        let (_tmp, mut broker) = test_broker(vec![]);
        let item = broker
            .enqueue(WORK_SHELL, serde_json::json!({"args": ["-la"]}))
            .unwrap();
        broker.approve(item.id, true, "op").unwrap();
        let err = broker.execute_now(item.id).await.unwrap_err();
        assert!(matches!(err, CourierError::BadRequest(_)));
    }

    #[tokio::test]
    async fn execute_twice_is_rejected() {
        let (_tmp, mut broker) = test_broker(vec![WhitelistEntry::new("echo", &[])]);
        let item = broker
            .enqueue(WORK_SHELL, shell_payload("echo", &["once"]))
            .unwrap();
        broker.approve(item.id, true, "op").unwrap();

        broker.execute_now(item.id).await.unwrap();
        let err = broker.execute_now(item.id).await.unwrap_err();
        assert!(matches!(err, CourierError::BadRequest(_)));
        assert_eq!(broker.results().len(), 1);
    }

    #[tokio::test]
    async fn end_to_end_ls_succeeds() {
        let (_tmp, mut broker) = test_broker(vec![WhitelistEntry::new("ls", &[])]);
        let item = broker
            .enqueue(WORK_SHELL, shell_payload("ls", &["-la"]))
            .unwrap();
        broker.approve(item.id, true, "operator").unwrap();

        let result = broker.execute_now(item.id).await.unwrap();
        assert_eq!(result.code, 0);
        assert!(!result.out.is_empty());
        assert_eq!(result.cmd, "ls");
        assert_eq!(result.args, vec!["-la".to_string()]);
    }

    #[tokio::test]
    async fn state_survives_restart() {
        let tmp = tempfile::tempdir().unwrap();
        let state_path = tmp.path().join("state.json");
        let wl_path = tmp.path().join("whitelist.json");

        let id = {
            let store = StateStore::open(&state_path).unwrap();
            let wl = Whitelist::from_entries(vec![WhitelistEntry::new("echo", &[])], &wl_path);
            let mut broker = Broker::new(store, wl);
            let item = broker
                .enqueue(WORK_SHELL, shell_payload("echo", &["persisted"]))
                .unwrap();
            broker.approve(item.id, true, "op").unwrap();
            item.id
        };

        // A fresh broker over the same file picks up the approved item.
        let store = StateStore::open(&state_path).unwrap();
        let wl = Whitelist::from_entries(vec![WhitelistEntry::new("echo", &[])], &wl_path);
        let mut broker = Broker::new(store, wl);
        assert_eq!(broker.next().unwrap().id, id);

        let result = broker.execute_now(id).await.unwrap();
        assert_eq!(result.code, 0);
        assert_eq!(result.out, "persisted\n");
    }

    #[test]
    fn whitelist_replace_logs_and_applies() {
        let (_tmp, mut broker) = test_broker(vec![WhitelistEntry::new("ls", &[])]);
        broker
            .replace_whitelist(vec![WhitelistEntry::new("date", &[])])
            .unwrap();
        let entries = broker.whitelist_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].cmd, "date");
        assert!(broker
            .log_tail(10)
            .iter()
            .any(|e| e.message.contains("whitelist replaced")));
    }
}
