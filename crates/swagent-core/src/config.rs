//! Configuration management for swagent
//!
//! Loads configuration with priority:
//! 1. swagent.toml (or specified config file)
//! 2. Environment variables (fallback, `.env` honored)
//! 3. Defaults

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the config file searched for in the current directory and parents
pub const CONFIG_FILE_NAME: &str = "swagent.toml";

/// swagent configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwagentConfig {
    #[serde(default)]
    pub contract: ContractConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Where the API contract is read from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractConfig {
    /// File path or http(s) URL of the OpenAPI document
    pub path: Option<String>,
}

/// Upstream API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL; falls back to the contract's first server when unset
    pub base_url: Option<String>,

    #[serde(default)]
    pub auth: ApiAuthConfig,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    pub user_agent: Option<String>,
}

/// Outbound credentials, applied to every request
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiAuthConfig {
    #[default]
    None,

    Bearer {
        token: String,
    },

    ApiKey {
        #[serde(default = "default_api_key_name")]
        name: String,
        key: String,
        #[serde(default)]
        location: KeyLocation,
    },

    Basic {
        username: String,
        password: String,
    },
}

/// Where an API key is placed
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KeyLocation {
    #[default]
    Header,
    Query,
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

/// Session registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,

    #[serde(default = "default_sweep_interval_minutes")]
    pub sweep_interval_minutes: u64,

    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    #[serde(default)]
    pub json_logs: bool,

    pub service_name: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            auth: ApiAuthConfig::None,
            timeout_secs: default_timeout_secs(),
            user_agent: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
            sweep_interval_minutes: default_sweep_interval_minutes(),
            max_history: default_max_history(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            json_logs: false,
            service_name: None,
        }
    }
}

impl SwagentConfig {
    /// Load configuration with the following priority:
    /// 1. swagent.toml in current directory or a parent
    /// 2. Environment variables (fallback)
    /// 3. Defaults
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        match Self::find_config_file() {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::debug!("No {} found, using environment", CONFIG_FILE_NAME);
                let mut config = Self::default();
                config.apply_env_fallbacks();
                Ok(config)
            }
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        tracing::debug!("Loading configuration from: {:?}", path);

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config = Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.apply_env_fallbacks();
        Ok(config)
    }

    /// Parse configuration from TOML text and resolve `${VAR}` references
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let mut config: SwagentConfig = toml::from_str(contents)?;
        config.resolve_env_vars();
        Ok(config)
    }

    /// Find swagent.toml by searching current directory and parents
    fn find_config_file() -> Option<PathBuf> {
        let mut current = env::current_dir().ok()?;

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Some(config_path);
            }

            if !current.pop() {
                return None;
            }
        }
    }

    /// Fill unset values from the environment
    fn apply_env_fallbacks(&mut self) {
        if self.contract.path.is_none() {
            self.contract.path = env::var("OPENAPI_FILE").ok();
        }

        if self.api.base_url.is_none() {
            self.api.base_url = env::var("API_BASE_URL").ok();
        }

        if self.api.auth == ApiAuthConfig::None {
            if let Ok(token) = env::var("API_TOKEN") {
                if !token.is_empty() {
                    self.api.auth = ApiAuthConfig::Bearer { token };
                }
            }
        }

        if let Some(timeout) = env::var("API_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            self.api.timeout_secs = timeout;
        }
    }

    /// Resolve ${VAR_NAME} references to environment variables
    fn resolve_env_vars(&mut self) {
        if let Some(ref path) = self.contract.path {
            self.contract.path = Self::resolve_env_var(path);
        }

        if let Some(ref url) = self.api.base_url {
            self.api.base_url = Self::resolve_env_var(url);
        }

        match self.api.auth {
            ApiAuthConfig::None => {}
            ApiAuthConfig::Bearer { ref mut token } => {
                if let Some(resolved) = Self::resolve_env_var(token) {
                    *token = resolved;
                }
            }
            ApiAuthConfig::ApiKey { ref mut key, .. } => {
                if let Some(resolved) = Self::resolve_env_var(key) {
                    *key = resolved;
                }
            }
            ApiAuthConfig::Basic {
                ref mut password, ..
            } => {
                if let Some(resolved) = Self::resolve_env_var(password) {
                    *password = resolved;
                }
            }
        }
    }

    /// Resolve a single ${VAR_NAME} reference
    fn resolve_env_var(value: &str) -> Option<String> {
        if value.starts_with("${") && value.ends_with('}') {
            let var_name = &value[2..value.len() - 1];
            env::var(var_name).ok()
        } else {
            Some(value.to_string())
        }
    }

    /// Create test-friendly defaults (no file or environment required)
    pub fn test_defaults() -> Self {
        Self {
            contract: ContractConfig {
                path: Some("tests/fixtures/openapi.yaml".to_string()),
            },
            api: ApiConfig {
                base_url: Some("http://127.0.0.1:8080".to_string()),
                auth: ApiAuthConfig::Bearer {
                    token: "test-token".to_string(),
                },
                timeout_secs: 5,
                user_agent: None,
            },
            retry: RetryConfig {
                max_retries: 3,
                initial_backoff_ms: 10,
                backoff_multiplier: 2.0,
                max_backoff_ms: 100,
            },
            session: SessionConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_api_key_name() -> String {
    "X-API-Key".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_ttl_hours() -> u64 {
    24
}

fn default_sweep_interval_minutes() -> u64 {
    60
}

fn default_max_history() -> usize {
    50
}

fn default_log_filter() -> String {
    "info".to_string()
}
