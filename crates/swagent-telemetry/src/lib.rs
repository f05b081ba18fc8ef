//! # swagent Telemetry
//!
//! Logging and OpenTelemetry tracing for API calls.
//!
//! [`init_telemetry`] installs the process-wide subscriber; [`trace_api_call`]
//! records one span per executed call with the attribute names in
//! [`attributes`].

mod spans;
mod tracer;

pub use spans::{ApiCallSpanAttributes, safe_serialize, trace_api_call};
pub use tracer::{init_telemetry, register_span_processor, tracer_provider};

/// Span attribute names.
///
/// HTTP attributes follow the OpenTelemetry semantic conventions; the
/// rest live under the `swagent.` prefix.
pub mod attributes {
    pub const HTTP_REQUEST_METHOD: &str = "http.request.method";
    pub const HTTP_RESPONSE_STATUS_CODE: &str = "http.response.status_code";
    pub const URL_FULL: &str = "url.full";

    pub const SWAGENT_OPERATION_NAME: &str = "swagent.operation.name";
    pub const SWAGENT_FUNCTION_NAME: &str = "swagent.function.name";
    pub const SWAGENT_CALL_SUCCESS: &str = "swagent.call.success";
    pub const SWAGENT_CALL_ATTEMPTS: &str = "swagent.call.attempts";
    pub const SWAGENT_CALL_ERROR: &str = "swagent.call.error";
    pub const SWAGENT_SESSION_ID: &str = "swagent.session.id";

    /// Default tracer name
    pub const SYSTEM_NAME: &str = "swagent";
}
