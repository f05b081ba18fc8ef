use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use swagent_core::{SessionConfig, SwagentConfig};
use swagent_openapi::{
    ApiContract, AuthConfig, ExecutorConfig, OpenApiError, OpenApiToolset, RetryPolicy,
};

/// Where a session gets its contract from.
#[derive(Debug, Clone)]
pub enum ContractSource {
    File(PathBuf),
    Url(String),
    /// Contract text, JSON or YAML
    Inline(String),
    /// An already loaded contract, shared between sessions
    Loaded(Arc<ApiContract>),
}

impl ContractSource {
    /// A file path, or a URL when `source` starts with `http://` or `https://`.
    pub fn from_location(source: impl Into<String>) -> Self {
        let source = source.into();
        if source.starts_with("http://") || source.starts_with("https://") {
            ContractSource::Url(source)
        } else {
            ContractSource::File(PathBuf::from(source))
        }
    }

    pub async fn load(&self, timeout: Duration) -> swagent_openapi::Result<Arc<ApiContract>> {
        match self {
            ContractSource::File(path) => Ok(Arc::new(ApiContract::from_file(path)?)),
            ContractSource::Url(url) => Ok(Arc::new(ApiContract::from_url(url, timeout).await?)),
            ContractSource::Inline(text) => Ok(Arc::new(ApiContract::from_str(text)?)),
            ContractSource::Loaded(contract) => Ok(contract.clone()),
        }
    }
}

/// Arguments for creating a session.
#[derive(Debug, Clone)]
pub struct SessionInit {
    pub contract: ContractSource,
    /// Overrides the contract's first server
    pub base_url: Option<String>,
    pub auth: AuthConfig,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub user_agent: Option<String>,
    /// Replace an existing session instead of reusing it
    pub force_new: bool,
}

impl SessionInit {
    pub fn new(contract: ContractSource) -> Self {
        Self {
            contract,
            base_url: None,
            auth: AuthConfig::None,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            user_agent: None,
            force_new: false,
        }
    }

    /// Build from the `[contract]`, `[api]` and `[retry]` sections.
    pub fn from_config(config: &SwagentConfig) -> swagent_core::Result<Self> {
        let path = config
            .contract
            .path
            .as_deref()
            .ok_or_else(|| swagent_core::Error::config_error("No contract path configured"))?;

        Ok(Self {
            contract: ContractSource::from_location(path),
            base_url: config.api.base_url.clone(),
            auth: AuthConfig::from(&config.api.auth),
            timeout: Duration::from_secs(config.api.timeout_secs),
            retry: RetryPolicy::from(&config.retry),
            user_agent: config.api.user_agent.clone(),
            force_new: false,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Load the contract and bind it to a fresh executor.
    pub(crate) async fn build_toolset(&self) -> swagent_openapi::Result<OpenApiToolset> {
        let contract = self.contract.load(self.timeout).await?;
        let base_url = self
            .base_url
            .as_deref()
            .or(contract.base_url())
            .ok_or_else(|| {
                OpenApiError::Other(
                    "No base URL given and the contract declares no servers".to_string(),
                )
            })?
            .to_string();

        let mut config = ExecutorConfig::new(base_url)
            .with_timeout(self.timeout)
            .with_retry(self.retry.clone())
            .with_auth(self.auth.clone());
        if let Some(user_agent) = &self.user_agent {
            config = config.with_user_agent(user_agent.clone());
        }
        OpenApiToolset::from_contract(contract, config)
    }
}

/// Registry tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Idle time after which a session is evicted
    pub ttl: TimeDelta,
    /// Minimum time between opportunistic sweeps
    pub sweep_interval: TimeDelta,
    /// Calls kept per session, oldest dropped first
    pub max_history: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for SessionSettings {
    fn from(config: &SessionConfig) -> Self {
        Self {
            ttl: hours(config.ttl_hours),
            sweep_interval: minutes(config.sweep_interval_minutes),
            max_history: config.max_history,
        }
    }
}

fn hours(value: u64) -> TimeDelta {
    i64::try_from(value)
        .ok()
        .and_then(TimeDelta::try_hours)
        .unwrap_or(TimeDelta::MAX)
}

fn minutes(value: u64) -> TimeDelta {
    i64::try_from(value)
        .ok()
        .and_then(TimeDelta::try_minutes)
        .unwrap_or(TimeDelta::MAX)
}

/// One entry of a session's call history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallRecord {
    pub function_name: String,
    pub arguments: Value,
    pub success: bool,
    /// Absent when the call never reached the network
    pub status: Option<u16>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Snapshot of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionInfo {
    pub caller_id: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub active: bool,
    pub history_len: usize,
    pub endpoints: usize,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryStats {
    pub total_sessions: usize,
    pub ttl_seconds: i64,
    pub last_sweep: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_from_location() {
        assert!(matches!(
            ContractSource::from_location("https://api.example.com/openapi.json"),
            ContractSource::Url(_)
        ));
        assert!(matches!(
            ContractSource::from_location("./openapi.yaml"),
            ContractSource::File(_)
        ));
    }

    #[test]
    fn test_settings_from_config() {
        let settings = SessionSettings::default();
        assert_eq!(settings.ttl, TimeDelta::hours(24));
        assert_eq!(settings.sweep_interval, TimeDelta::minutes(60));
        assert_eq!(settings.max_history, 50);

        let huge = SessionSettings::from(&SessionConfig {
            ttl_hours: u64::MAX,
            sweep_interval_minutes: 0,
            max_history: 1,
        });
        assert_eq!(huge.ttl, TimeDelta::MAX);
        assert_eq!(huge.sweep_interval, TimeDelta::zero());
    }

    #[test]
    fn test_init_from_config() {
        let init = SessionInit::from_config(&SwagentConfig::test_defaults()).unwrap();
        assert!(matches!(init.contract, ContractSource::File(_)));
        assert_eq!(init.base_url.as_deref(), Some("http://127.0.0.1:8080"));
        assert!(matches!(init.auth, AuthConfig::Bearer { .. }));
        assert_eq!(init.timeout, Duration::from_secs(5));
        assert!(!init.force_new);

        let mut config = SwagentConfig::test_defaults();
        config.contract.path = None;
        assert!(SessionInit::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_build_toolset_needs_a_base_url() {
        let init = SessionInit::new(ContractSource::Inline(
            r#"{"openapi": "3.0.0", "info": {"title": "T", "version": "1"}, "paths": {}}"#
                .to_string(),
        ));
        let err = init.build_toolset().await.unwrap_err();
        assert!(err.to_string().contains("No base URL"));

        let toolset = init
            .with_base_url("http://127.0.0.1:9")
            .build_toolset()
            .await
            .unwrap();
        assert!(toolset.is_empty());
    }
}
