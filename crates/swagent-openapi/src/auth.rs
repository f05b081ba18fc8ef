//! Outbound authentication for API calls.
//!
//! Supported methods:
//! - API Key (in header or query parameter)
//! - Bearer Token (Authorization: Bearer <token>)
//! - Basic Auth (Authorization: Basic <base64>)

use serde::{Deserialize, Serialize};
use std::fmt;
use swagent_core::{ApiAuthConfig, KeyLocation};

/// Authentication applied to every request an executor sends.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// No authentication
    #[default]
    None,

    /// API Key authentication
    ApiKey {
        /// Location of the API key
        location: KeyLocation,
        /// Name of the header or query parameter
        name: String,
        /// The API key value
        key: String,
    },

    /// Bearer token authentication (Authorization: Bearer <token>)
    Bearer {
        /// The bearer token
        token: String,
    },

    /// HTTP Basic authentication (Authorization: Basic <base64>)
    Basic {
        /// Username
        username: String,
        /// Password
        password: String,
    },
}

impl AuthConfig {
    /// Create API key authentication in header.
    ///
    /// # Example
    ///
    /// ```
    /// use swagent_openapi::AuthConfig;
    ///
    /// let auth = AuthConfig::api_key_header("X-API-Key", "my-secret-key");
    /// ```
    pub fn api_key_header(header_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self::ApiKey {
            location: KeyLocation::Header,
            name: header_name.into(),
            key: key.into(),
        }
    }

    /// Create API key authentication in query parameter.
    pub fn api_key_query(param_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self::ApiKey {
            location: KeyLocation::Query,
            name: param_name.into(),
            key: key.into(),
        }
    }

    /// Create bearer token authentication.
    ///
    /// # Example
    ///
    /// ```
    /// use swagent_openapi::AuthConfig;
    ///
    /// let auth = AuthConfig::bearer("my-bearer-token");
    /// ```
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    /// Create basic authentication.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, AuthConfig::None)
    }

    /// Apply authentication to a reqwest RequestBuilder.
    pub(crate) fn apply_to_request(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> reqwest::RequestBuilder {
        match self {
            AuthConfig::None => builder,
            AuthConfig::ApiKey {
                location,
                name,
                key,
            } => match location {
                KeyLocation::Header => builder.header(name, key),
                KeyLocation::Query => builder.query(&[(name, key)]),
            },
            AuthConfig::Bearer { token } => builder.bearer_auth(token),
            AuthConfig::Basic { username, password } => {
                builder.basic_auth(username, Some(password))
            }
        }
    }
}

impl From<&ApiAuthConfig> for AuthConfig {
    fn from(config: &ApiAuthConfig) -> Self {
        match config {
            ApiAuthConfig::None => AuthConfig::None,
            ApiAuthConfig::Bearer { token } => AuthConfig::bearer(token),
            ApiAuthConfig::ApiKey {
                name,
                key,
                location,
            } => AuthConfig::ApiKey {
                location: *location,
                name: name.clone(),
                key: key.clone(),
            },
            ApiAuthConfig::Basic { username, password } => AuthConfig::basic(username, password),
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthConfig::None => f.write_str("None"),
            AuthConfig::ApiKey { location, name, .. } => f
                .debug_struct("ApiKey")
                .field("location", location)
                .field("name", name)
                .field("key", &"***")
                .finish(),
            AuthConfig::Bearer { .. } => f.debug_struct("Bearer").field("token", &"***").finish(),
            AuthConfig::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}
