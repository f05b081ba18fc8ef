//! Normalized outcome of an API call.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Longest raw-text excerpt copied into an error string.
const MAX_ERROR_TEXT: usize = 200;

/// Result of one call, successful or not.
///
/// Every failure after validation is reported here rather than as an
/// error, so callers render both outcomes the same way.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionResult {
    pub success: bool,
    /// HTTP status, or a synthetic one for transport failures
    pub status: u16,
    /// Parsed JSON, or the raw text when the body is not JSON
    pub data: Option<Value>,
    pub error: Option<String>,
    pub url: String,
    pub method: String,
    /// Response headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// HTTP attempts made, retries included
    #[serde(default)]
    pub attempts: u32,
}

impl ExecutionResult {
    /// Normalize an HTTP response.
    pub fn from_response(
        status: u16,
        body: &str,
        url: impl Into<String>,
        method: impl Into<String>,
        headers: BTreeMap<String, String>,
        attempts: u32,
    ) -> Self {
        let data = parse_body(body);
        let success = (200..300).contains(&status);
        let error = (!success).then(|| upstream_error(status, data.as_ref()));

        Self {
            success,
            status,
            data,
            error,
            url: url.into(),
            method: method.into(),
            headers,
            attempts,
        }
    }

    /// A terminal result for a request that produced no response.
    pub fn transport_failure(
        failure: TransportFailure,
        message: impl Into<String>,
        url: impl Into<String>,
        method: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            success: false,
            status: failure.status(),
            data: None,
            error: Some(message.into()),
            url: url.into(),
            method: method.into(),
            headers: BTreeMap::new(),
            attempts,
        }
    }

    /// The `message` of a JSON body, if any.
    pub fn message(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.get("message"))
            .and_then(Value::as_str)
    }
}

/// Why a request never produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportFailure {
    Timeout,
    Connect,
    Cancelled,
    Other,
}

impl TransportFailure {
    pub fn classify(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            TransportFailure::Timeout
        } else if error.is_connect() {
            TransportFailure::Connect
        } else {
            TransportFailure::Other
        }
    }

    /// Synthetic status reported for the failure.
    pub fn status(&self) -> u16 {
        match self {
            TransportFailure::Timeout => 408,
            TransportFailure::Connect => 503,
            TransportFailure::Cancelled => 499,
            TransportFailure::Other => 500,
        }
    }

    pub fn describe(&self, detail: &str) -> String {
        match self {
            TransportFailure::Timeout => format!("Request timed out: {}", detail),
            TransportFailure::Connect => format!("Connection failed: {}", detail),
            TransportFailure::Cancelled => "Request cancelled".to_string(),
            TransportFailure::Other => format!("Request failed: {}", detail),
        }
    }
}

fn parse_body(body: &str) -> Option<Value> {
    if body.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string())))
}

fn upstream_error(status: u16, data: Option<&Value>) -> String {
    let detail = match data {
        Some(Value::Object(map)) => map.get("message").and_then(Value::as_str).map(str::to_string),
        Some(Value::String(text)) => {
            let text = text.trim();
            Some(match text.char_indices().nth(MAX_ERROR_TEXT) {
                Some((cut, _)) => format!("{}...", &text[..cut]),
                None => text.to_string(),
            })
        }
        _ => None,
    };

    match detail {
        Some(detail) if !detail.is_empty() => format!("HTTP {}: {}", status, detail),
        _ => format!("HTTP {}", status),
    }
}
