//! Tracer setup and management

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::{SimpleSpanProcessor, TracerProvider};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use swagent_core::ObservabilityConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Global tracer provider holder
static TRACER_PROVIDER: OnceLock<Arc<TracerProvider>> = OnceLock::new();

/// Global span processor builders (registered before initialization)
type ProcessorBuilder = Box<dyn FnOnce() -> SimpleSpanProcessor + Send>;
static SPAN_PROCESSOR_BUILDERS: Mutex<Option<Vec<ProcessorBuilder>>> = Mutex::new(Some(Vec::new()));

/// Register a span processor builder used when telemetry is initialized.
///
/// Exporters (Jaeger, OTLP, a test collector) are plugged in this way.
/// Must be called BEFORE `init_telemetry()`.
///
/// # Example
///
/// ```ignore
/// use swagent_telemetry::{register_span_processor, init_telemetry};
/// use opentelemetry_sdk::trace::SimpleSpanProcessor;
///
/// register_span_processor(Box::new(|| {
///     SimpleSpanProcessor::new(Box::new(/* your exporter */))
/// }));
/// init_telemetry(&Default::default());
/// ```
pub fn register_span_processor(builder: ProcessorBuilder) {
    let mut builders = SPAN_PROCESSOR_BUILDERS
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some(ref mut vec) = *builders {
        vec.push(builder);
    } else {
        tracing::warn!("Attempted to register span processor after telemetry initialization");
    }
}

/// Initialize logging and OpenTelemetry tracing.
///
/// This sets up:
/// - A tracer provider with any registered span processors
/// - An `EnvFilter` from `RUST_LOG`, else `config.log_filter`
/// - Plain or JSON formatted output per `config.json_logs`
///
/// Returns `false` when a global subscriber was already installed, in
/// which case nothing changes.
///
/// # Example
///
/// ```rust,no_run
/// use swagent_core::ObservabilityConfig;
/// use swagent_telemetry::init_telemetry;
///
/// init_telemetry(&ObservabilityConfig::default());
/// ```
pub fn init_telemetry(config: &ObservabilityConfig) -> bool {
    // Take the span processor builders (can only initialize once)
    let builders = SPAN_PROCESSOR_BUILDERS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
        .unwrap_or_default();

    let mut provider_builder = TracerProvider::builder();
    for builder in builders {
        provider_builder = provider_builder.with_span_processor(builder());
    }
    let tracer_provider = provider_builder.build();

    let tracer_name = config
        .service_name
        .clone()
        .unwrap_or_else(|| crate::attributes::SYSTEM_NAME.to_string());
    let tracer = tracer_provider.tracer(tracer_name);
    let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter.as_str()));

    let json_layer = config.json_logs.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
    });
    let plain_layer = (!config.json_logs).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_line_number(true)
    });

    let installed = tracing_subscriber::registry()
        .with(telemetry_layer)
        .with(json_layer)
        .with(plain_layer)
        .with(filter)
        .try_init()
        .is_ok();

    if installed {
        let _ = TRACER_PROVIDER.set(Arc::new(tracer_provider));
    } else {
        tracing::warn!("Telemetry already initialized, keeping the existing subscriber");
    }
    installed
}

/// Get the global tracer provider if initialized
pub fn tracer_provider() -> Option<Arc<TracerProvider>> {
    TRACER_PROVIDER.get().cloned()
}
