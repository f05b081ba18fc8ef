use crate::entry::SessionEntry;
use crate::types::{RegistryStats, SessionInfo, SessionInit, SessionSettings};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use swagent_core::{Error, Result};
use tracing::{debug, info};

/// Per-caller sessions with idle eviction.
///
/// Every read, create, close and sweep runs under one lock, so a sweep can
/// never evict an entry between its lookup and its refresh. Contract
/// loading happens outside the lock; when two callers race to create the
/// same session, the first insert wins and the other result is dropped.
///
/// The registry is a plain value. Create one per process and share it
/// through an `Arc`.
#[derive(Debug)]
pub struct SessionRegistry {
    settings: SessionSettings,
    state: Mutex<RegistryState>,
}

#[derive(Debug)]
struct RegistryState {
    sessions: HashMap<String, Arc<SessionEntry>>,
    last_sweep: DateTime<Utc>,
}

impl SessionRegistry {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(RegistryState {
                sessions: HashMap::new(),
                last_sweep: Utc::now(),
            }),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Return the caller's active session, refreshed, or create one.
    pub async fn get_or_create(&self, caller_id: &str, init: &SessionInit) -> Result<Arc<SessionEntry>> {
        self.get_or_create_at(caller_id, init, Utc::now()).await
    }

    /// [`get_or_create`](Self::get_or_create) with an explicit clock.
    pub async fn get_or_create_at(
        &self,
        caller_id: &str,
        init: &SessionInit,
        now: DateTime<Utc>,
    ) -> Result<Arc<SessionEntry>> {
        if caller_id.trim().is_empty() {
            return Err(Error::Session("Caller id must not be empty".to_string()));
        }

        if !init.force_new
            && let Some(entry) = self.get_at(caller_id, now)
        {
            return Ok(entry);
        }

        let toolset = init
            .build_toolset()
            .await
            .map_err(|e| Error::initialization(caller_id, e))?;
        let fresh = Arc::new(SessionEntry::new(
            caller_id,
            toolset,
            self.settings.max_history,
            now,
        ));

        let mut state = self.lock();
        if init.force_new {
            if let Some(old) = state.sessions.remove(caller_id) {
                old.deactivate();
                info!("Replaced session {} for {}", old.session_id(), caller_id);
            }
        } else if let Some(entry) = self.lookup(&mut state, caller_id, now) {
            debug!("Session for {} created concurrently, keeping it", caller_id);
            return Ok(entry);
        }

        info!(
            "Created session {} for {} ({} endpoints)",
            fresh.session_id(),
            caller_id,
            fresh.toolset().len()
        );
        state.sessions.insert(caller_id.to_string(), fresh.clone());
        Ok(fresh)
    }

    /// The caller's active session, refreshed, without creating one.
    pub fn get(&self, caller_id: &str) -> Option<Arc<SessionEntry>> {
        self.get_at(caller_id, Utc::now())
    }

    pub fn get_at(&self, caller_id: &str, now: DateTime<Utc>) -> Option<Arc<SessionEntry>> {
        self.lookup(&mut self.lock(), caller_id, now)
    }

    /// Deactivate and remove the caller's session. Returns whether one existed.
    pub fn close(&self, caller_id: &str) -> bool {
        let removed = self.lock().sessions.remove(caller_id);
        match removed {
            Some(entry) => {
                entry.deactivate();
                info!("Closed session {} for {}", entry.session_id(), caller_id);
                true
            }
            None => false,
        }
    }

    /// Remove every session idle for longer than the TTL.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        self.sweep_locked(&mut self.lock(), now)
    }

    pub fn stats(&self) -> RegistryStats {
        let state = self.lock();
        RegistryStats {
            total_sessions: state.sessions.len(),
            ttl_seconds: self.settings.ttl.num_seconds(),
            last_sweep: state.last_sweep,
        }
    }

    /// Snapshot of every live session, sorted by caller id.
    pub fn sessions_info(&self) -> Vec<SessionInfo> {
        let mut state = self.lock();
        self.maybe_sweep(&mut state, Utc::now());

        let mut infos: Vec<SessionInfo> = state.sessions.values().map(|e| e.info()).collect();
        infos.sort_by(|a, b| a.caller_id.cmp(&b.caller_id));
        infos
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().sessions.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(
        &self,
        state: &mut RegistryState,
        caller_id: &str,
        now: DateTime<Utc>,
    ) -> Option<Arc<SessionEntry>> {
        self.maybe_sweep(state, now);

        let entry = state.sessions.get(caller_id)?.clone();
        if entry.is_expired(now, self.settings.ttl) {
            state.sessions.remove(caller_id);
            entry.deactivate();
            info!("Session {} for {} expired", entry.session_id(), caller_id);
            return None;
        }
        entry.touch(now);
        Some(entry)
    }

    fn maybe_sweep(&self, state: &mut RegistryState, now: DateTime<Utc>) {
        if now.signed_duration_since(state.last_sweep) >= self.settings.sweep_interval {
            self.sweep_locked(state, now);
        }
    }

    fn sweep_locked(&self, state: &mut RegistryState, now: DateTime<Utc>) -> usize {
        let ttl = self.settings.ttl;
        let before = state.sessions.len();
        state.sessions.retain(|_, entry| {
            let expired = entry.is_expired(now, ttl);
            if expired {
                entry.deactivate();
            }
            !expired
        });
        state.last_sweep = now;

        let removed = before - state.sessions.len();
        if removed > 0 {
            info!("Swept {} expired sessions, {} remaining", removed, state.sessions.len());
        }
        removed
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(SessionSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContractSource;
    use chrono::TimeDelta;
    use swagent_openapi::ApiContract;

    const CONTRACT: &str = r#"{
        "openapi": "3.0.0",
        "info": {"title": "Pets", "version": "1.0.0"},
        "servers": [{"url": "http://127.0.0.1:9"}],
        "paths": {
            "/pets": {"get": {"operationId": "listPets", "responses": {"200": {"description": "OK"}}}}
        }
    }"#;

    fn init() -> SessionInit {
        SessionInit::new(ContractSource::Loaded(Arc::new(
            ApiContract::from_str(CONTRACT).unwrap(),
        )))
    }

    #[tokio::test]
    async fn test_get_or_create_reuses_entry() {
        let registry = SessionRegistry::default();

        let first = registry.get_or_create("alice", &init()).await.unwrap();
        let second = registry.get_or_create("alice", &init()).await.unwrap();

        assert_eq!(first.session_id(), second.session_id());
        assert_eq!(registry.len(), 1);
        assert_eq!(first.info().base_url, "http://127.0.0.1:9");
    }

    #[tokio::test]
    async fn test_force_new_replaces_entry() {
        let registry = SessionRegistry::default();

        let old = registry.get_or_create("alice", &init()).await.unwrap();
        let new = registry
            .get_or_create("alice", &init().force_new())
            .await
            .unwrap();

        assert_ne!(old.session_id(), new.session_id());
        assert!(!old.is_active());
        assert!(new.is_active());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_initialization_failure() {
        let registry = SessionRegistry::default();
        let bad = SessionInit::new(ContractSource::Inline("info: {}".to_string()));

        let err = registry.get_or_create("alice", &bad).await.unwrap_err();
        assert!(matches!(err, Error::Initialization { ref caller_id, .. } if caller_id == "alice"));
        assert!(registry.is_empty());

        assert!(matches!(
            registry.get_or_create("  ", &init()).await,
            Err(Error::Session(_))
        ));
    }

    #[tokio::test]
    async fn test_close_only_affects_one_caller() {
        let registry = SessionRegistry::default();
        let alice = registry.get_or_create("alice", &init()).await.unwrap();
        registry.get_or_create("bob", &init()).await.unwrap();

        assert!(registry.close("alice"));
        assert!(!registry.close("alice"));
        assert!(!alice.is_active());
        assert!(registry.get("alice").is_none());
        assert!(registry.get("bob").is_some());
    }

    #[tokio::test]
    async fn test_sweep_evicts_idle_sessions() {
        let registry = SessionRegistry::default();
        let start = Utc::now();
        registry
            .get_or_create_at("alice", &init(), start)
            .await
            .unwrap();
        registry.get_or_create_at("bob", &init(), start).await.unwrap();

        let later = start + TimeDelta::hours(23);
        assert!(registry.get_at("bob", later).is_some());

        let removed = registry.sweep(start + TimeDelta::hours(25));
        assert_eq!(removed, 1);
        assert!(registry.get_at("alice", start + TimeDelta::hours(25)).is_none());
        assert!(registry.get_at("bob", start + TimeDelta::hours(25)).is_some());
        assert_eq!(registry.stats().total_sessions, 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_not_returned_before_sweep() {
        let registry = SessionRegistry::new(SessionSettings {
            ttl: TimeDelta::minutes(5),
            sweep_interval: TimeDelta::days(1),
            max_history: 10,
        });
        let start = Utc::now();
        let old = registry
            .get_or_create_at("alice", &init(), start)
            .await
            .unwrap();

        assert!(registry.get_at("alice", start + TimeDelta::minutes(10)).is_none());
        assert!(!old.is_active());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_stats_and_sessions_info() {
        let registry = SessionRegistry::default();
        registry.get_or_create("bob", &init()).await.unwrap();
        registry.get_or_create("alice", &init()).await.unwrap();

        let stats = registry.stats();
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.ttl_seconds, 24 * 3600);

        let callers: Vec<String> = registry
            .sessions_info()
            .into_iter()
            .map(|info| info.caller_id)
            .collect();
        assert_eq!(callers, vec!["alice", "bob"]);
    }
}
