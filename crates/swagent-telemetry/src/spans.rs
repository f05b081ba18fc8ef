//! Span helpers for API calls

use crate::attributes::*;

/// Attributes for tracing one API call
#[derive(Debug, Clone, Default)]
pub struct ApiCallSpanAttributes {
    pub function_name: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub success: bool,
    pub attempts: u32,
    pub error: Option<String>,
    pub session_id: Option<String>,
}

/// Create and record a span for an executed API call.
///
/// The span carries the function name, HTTP method, URL, final status,
/// outcome and attempt count. Error and session id are recorded only when
/// present.
pub fn trace_api_call(attrs: ApiCallSpanAttributes) {
    let span = tracing::info_span!(
        "execute_api_call",
        { SWAGENT_OPERATION_NAME } = "execute_api_call",
        { SWAGENT_FUNCTION_NAME } = %attrs.function_name,
        { HTTP_REQUEST_METHOD } = %attrs.method,
        { URL_FULL } = %attrs.url,
        { HTTP_RESPONSE_STATUS_CODE } = attrs.status,
        { SWAGENT_CALL_SUCCESS } = attrs.success,
        { SWAGENT_CALL_ATTEMPTS } = attrs.attempts,
        { SWAGENT_CALL_ERROR } = tracing::field::Empty,
        { SWAGENT_SESSION_ID } = tracing::field::Empty,
    );

    if let Some(error) = &attrs.error {
        span.record(SWAGENT_CALL_ERROR, error.as_str());
    }
    if let Some(session_id) = &attrs.session_id {
        span.record(SWAGENT_SESSION_ID, session_id.as_str());
    }

    // Enter and immediately exit the span (it's recorded)
    let _guard = span.enter();
}

/// Helper to safely serialize to JSON string
pub fn safe_serialize<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "<not serializable>".to_string())
}
