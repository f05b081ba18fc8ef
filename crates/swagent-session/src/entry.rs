use crate::types::{CallRecord, SessionInfo};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use swagent_openapi::{ApiContract, CallError, ExecutionResult, FunctionSchema, OpenApiToolset};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Why a session call produced no [`ExecutionResult`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionCallError {
    #[error("Session for '{0}' is closed")]
    Closed(String),

    #[error(transparent)]
    Call(#[from] CallError),
}

/// One caller's isolated contract, executor and call history.
#[derive(Debug)]
pub struct SessionEntry {
    caller_id: String,
    session_id: String,
    created_at: DateTime<Utc>,
    last_active: RwLock<DateTime<Utc>>,
    active: AtomicBool,
    toolset: OpenApiToolset,
    history: Mutex<VecDeque<CallRecord>>,
    max_history: usize,
}

impl SessionEntry {
    pub(crate) fn new(
        caller_id: impl Into<String>,
        toolset: OpenApiToolset,
        max_history: usize,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            caller_id: caller_id.into(),
            session_id: Uuid::new_v4().to_string(),
            created_at: now,
            last_active: RwLock::new(now),
            active: AtomicBool::new(true),
            toolset,
            history: Mutex::new(VecDeque::new()),
            max_history,
        }
    }

    pub fn caller_id(&self) -> &str {
        &self.caller_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        *self.last_active.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn toolset(&self) -> &OpenApiToolset {
        &self.toolset
    }

    pub fn contract(&self) -> &Arc<ApiContract> {
        self.toolset.contract()
    }

    pub fn function_schemas(&self) -> &[FunctionSchema] {
        self.toolset.function_schemas()
    }

    /// Copy of the call history, oldest first.
    pub fn history(&self) -> Vec<CallRecord> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            caller_id: self.caller_id.clone(),
            session_id: self.session_id.clone(),
            created_at: self.created_at,
            last_active: self.last_active(),
            active: self.is_active(),
            history_len: self.history.lock().unwrap_or_else(PoisonError::into_inner).len(),
            endpoints: self.toolset.len(),
            base_url: self.toolset.executor().base_url().to_string(),
        }
    }

    /// Run `function` with raw `args` and record the outcome.
    pub async fn call(
        &self,
        function: &str,
        args: &Value,
    ) -> Result<ExecutionResult, SessionCallError> {
        self.call_cancellable(function, args, &CancellationToken::new())
            .await
    }

    pub async fn call_cancellable(
        &self,
        function: &str,
        args: &Value,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, SessionCallError> {
        if !self.is_active() {
            return Err(SessionCallError::Closed(self.caller_id.clone()));
        }
        self.touch(Utc::now());

        let outcome = self
            .toolset
            .call_cancellable(function, args, cancel, Some(&self.session_id))
            .await;

        let record = match &outcome {
            Ok(result) => CallRecord {
                function_name: function.to_string(),
                arguments: args.clone(),
                success: result.success,
                status: Some(result.status),
                error: result.error.clone(),
                timestamp: Utc::now(),
            },
            Err(e) => CallRecord {
                function_name: function.to_string(),
                arguments: args.clone(),
                success: false,
                status: None,
                error: Some(e.to_string()),
                timestamp: Utc::now(),
            },
        };
        self.record(record);

        outcome.map_err(SessionCallError::from)
    }

    pub(crate) fn touch(&self, now: DateTime<Utc>) {
        let mut last_active = self.last_active.write().unwrap_or_else(PoisonError::into_inner);
        if now > *last_active {
            *last_active = now;
        }
    }

    pub(crate) fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::TimeDelta) -> bool {
        now.signed_duration_since(self.last_active()) > ttl
    }

    /// Mark closed and drop the history.
    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn record(&self, record: CallRecord) {
        if self.max_history == 0 {
            return;
        }
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        while history.len() >= self.max_history {
            history.pop_front();
        }
        debug!(
            "Session {} recorded call to {} (success: {})",
            self.session_id, record.function_name, record.success
        );
        history.push_back(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use swagent_openapi::{ExecutorConfig, RetryPolicy};

    const CONTRACT: &str = r#"
openapi: 3.0.0
info:
  title: Users
  version: 1.0.0
paths:
  /users/{id}:
    get:
      operationId: getUser
      parameters:
        - name: id
          in: path
          required: true
          schema:
            type: integer
      responses:
        '200':
          description: OK
"#;

    fn entry(base_url: &str, max_history: usize) -> SessionEntry {
        let contract = Arc::new(ApiContract::from_str(CONTRACT).unwrap());
        let toolset = OpenApiToolset::from_contract(
            contract,
            ExecutorConfig::new(base_url).with_retry(RetryPolicy::none()),
        )
        .unwrap();
        SessionEntry::new("alice", toolset, max_history, Utc::now())
    }

    #[tokio::test]
    async fn test_call_is_recorded() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/users/7")
            .with_status(404)
            .with_body(r#"{"message": "User not found"}"#)
            .create_async()
            .await;

        let entry = entry(&server.url(), 10);
        let result = entry.call("getUser", &json!({"id": 7})).await.unwrap();
        mock.assert_async().await;

        assert!(!result.success);
        let history = entry.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].function_name, "getUser");
        assert_eq!(history[0].status, Some(404));
        assert_eq!(history[0].error.as_deref(), Some("HTTP 404: User not found"));
    }

    #[tokio::test]
    async fn test_rejected_calls_are_recorded() {
        let entry = entry("http://127.0.0.1:9", 10);

        let err = entry.call("getUser", &json!({})).await.unwrap_err();
        assert!(matches!(err, SessionCallError::Call(CallError::Validation(_))));

        let err = entry.call("nope", &json!({})).await.unwrap_err();
        assert_eq!(
            err,
            SessionCallError::Call(CallError::UnknownFunction("nope".to_string()))
        );

        let history = entry.history();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|r| !r.success && r.status.is_none()));
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let entry = entry("http://127.0.0.1:9", 2);
        for name in ["a", "b", "c"] {
            let _ = entry.call(name, &json!({})).await;
        }

        let names: Vec<String> = entry.history().into_iter().map(|r| r.function_name).collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_closed_entry_refuses_calls() {
        let entry = entry("http://127.0.0.1:9", 10);
        let _ = entry.call("nope", &json!({})).await;
        entry.deactivate();

        assert!(!entry.is_active());
        assert!(entry.history().is_empty());
        assert_eq!(
            entry.call("getUser", &json!({"id": 1})).await.unwrap_err(),
            SessionCallError::Closed("alice".to_string())
        );
    }

    #[test]
    fn test_info_snapshot() {
        let entry = entry("http://127.0.0.1:9", 10);
        let info = entry.info();
        assert_eq!(info.caller_id, "alice");
        assert_eq!(info.session_id, entry.session_id());
        assert!(info.active);
        assert_eq!(info.endpoints, 1);
        assert_eq!(info.history_len, 0);
        assert_eq!(info.base_url, "http://127.0.0.1:9");
    }

    #[test]
    fn test_touch_never_moves_backwards() {
        let entry = entry("http://127.0.0.1:9", 10);
        let before = entry.last_active();
        entry.touch(before - chrono::TimeDelta::hours(1));
        assert_eq!(entry.last_active(), before);
    }
}
