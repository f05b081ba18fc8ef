//! HTTP execution with retries and response normalization.

use crate::auth::AuthConfig;
use crate::error::{OpenApiError, Result};
use crate::request::{PreparedRequest, RequestBody, build_request};
use crate::result::{ExecutionResult, TransportFailure};
use crate::retry::RetryPolicy;
use crate::types::ValidatedCall;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::Method;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use swagent_core::{ApiConfig, RetryConfig};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};
use url::Url;

/// `swagent/<crate version>`
pub fn default_user_agent() -> String {
    format!("swagent/{}", env!("CARGO_PKG_VERSION"))
}

/// Settings for an [`Executor`].
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub base_url: String,
    /// Per-attempt request timeout
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub auth: AuthConfig,
    pub user_agent: String,
    /// Extra headers sent with every request
    pub default_headers: Vec<(String, String)>,
}

impl ExecutorConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            auth: AuthConfig::None,
            user_agent: default_user_agent(),
            default_headers: Vec::new(),
        }
    }

    /// Build from configuration, using `fallback_base_url` (usually the
    /// contract's first server) when no base URL is configured.
    pub fn from_config(
        api: &ApiConfig,
        retry: &RetryConfig,
        fallback_base_url: Option<&str>,
    ) -> Result<Self> {
        let base_url = api
            .base_url
            .as_deref()
            .or(fallback_base_url)
            .ok_or_else(|| {
                OpenApiError::Other(
                    "No base URL configured and the contract declares no servers".to_string(),
                )
            })?;

        let mut config = Self::new(base_url)
            .with_timeout(Duration::from_secs(api.timeout_secs))
            .with_retry(RetryPolicy::from(retry))
            .with_auth(AuthConfig::from(&api.auth));
        if let Some(user_agent) = &api.user_agent {
            config = config.with_user_agent(user_agent.clone());
        }
        Ok(config)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Add a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }
}

/// Sends prepared requests for validated calls.
///
/// The executor never returns an error once built: every outcome,
/// including transport failures and cancellation, is an
/// [`ExecutionResult`].
#[derive(Debug, Clone)]
pub struct Executor {
    config: ExecutorConfig,
    client: reqwest::Client,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        for (name, value) in &config.default_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| OpenApiError::Other(format!("Invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| OpenApiError::Other(format!("Invalid value for header '{}': {}", name, e)))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub async fn execute(&self, call: &ValidatedCall<'_>) -> ExecutionResult {
        self.execute_cancellable(call, &CancellationToken::new()).await
    }

    /// Execute, giving up with status 499 as soon as `cancel` fires.
    #[instrument(
        skip(self, call, cancel),
        fields(function = %call.endpoint().function_name, method = %call.endpoint().method)
    )]
    pub async fn execute_cancellable(
        &self,
        call: &ValidatedCall<'_>,
        cancel: &CancellationToken,
    ) -> ExecutionResult {
        let request = build_request(call);
        let method = request.method.to_reqwest();

        let url = match self.url_for(&request.path) {
            Ok(url) => url,
            Err(e) => {
                error!("Cannot build URL for {}: {}", request.path, e);
                return ExecutionResult::transport_failure(
                    TransportFailure::Other,
                    TransportFailure::Other.describe(&e.to_string()),
                    self.joined(&request.path),
                    method.as_str(),
                    0,
                );
            }
        };

        let attempts = AtomicU32::new(0);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("{} {} cancelled", method, url);
                ExecutionResult::transport_failure(
                    TransportFailure::Cancelled,
                    TransportFailure::Cancelled.describe(""),
                    url.as_str(),
                    method.as_str(),
                    attempts.load(Ordering::Relaxed),
                )
            }
            result = self.send(&request, &method, &url, &attempts) => result,
        }
    }

    async fn send(
        &self,
        request: &PreparedRequest,
        method: &Method,
        url: &Url,
        attempts: &AtomicU32,
    ) -> ExecutionResult {
        let policy = &self.config.retry;
        let mut attempt = 0;

        loop {
            attempt += 1;
            attempts.store(attempt, Ordering::Relaxed);
            debug!("Attempt {}: {} {}", attempt, method, url);

            match self.prepare(method, url, request).send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if policy.should_retry_status(method, status, attempt) {
                        let delay = policy.delay_for(attempt, retry_after(response.headers()));
                        warn!(
                            "{} {} returned {}, retrying in {:?} (attempt {}/{})",
                            method,
                            url,
                            status,
                            delay,
                            attempt,
                            policy.max_attempts()
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    let headers = collect_headers(response.headers());
                    return match response.text().await {
                        Ok(body) => ExecutionResult::from_response(
                            status,
                            &body,
                            url.as_str(),
                            method.as_str(),
                            headers,
                            attempt,
                        ),
                        Err(e) => {
                            let failure = TransportFailure::classify(&e);
                            error!("Failed to read response from {} {}: {}", method, url, e);
                            ExecutionResult::transport_failure(
                                failure,
                                failure.describe(&e.to_string()),
                                url.as_str(),
                                method.as_str(),
                                attempt,
                            )
                        }
                    };
                }
                Err(e) => {
                    let failure = TransportFailure::classify(&e);
                    if policy.should_retry_transport(
                        method,
                        failure == TransportFailure::Connect,
                        attempt,
                    ) {
                        let delay = policy.delay_for(attempt, None);
                        warn!(
                            "{} {} failed to connect, retrying in {:?} (attempt {}/{}): {}",
                            method,
                            url,
                            delay,
                            attempt,
                            policy.max_attempts(),
                            e
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    error!("{} {} failed: {}", method, url, e);
                    return ExecutionResult::transport_failure(
                        failure,
                        failure.describe(&e.to_string()),
                        url.as_str(),
                        method.as_str(),
                        attempt,
                    );
                }
            }
        }
    }

    fn prepare(&self, method: &Method, url: &Url, request: &PreparedRequest) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method.clone(), url.clone());

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        builder = match &request.body {
            None => builder,
            Some(RequestBody::Json(payload)) => builder.json(payload),
            Some(RequestBody::Form(pairs)) => builder.form(pairs),
            Some(RequestBody::Multipart(pairs)) => {
                let form = pairs
                    .iter()
                    .fold(reqwest::multipart::Form::new(), |form, (name, value)| {
                        form.text(name.clone(), value.clone())
                    });
                builder.multipart(form)
            }
            Some(RequestBody::Raw {
                content_type,
                content,
            }) => builder
                .header(CONTENT_TYPE, content_type.as_str())
                .body(content.clone()),
        };

        self.config.auth.apply_to_request(builder)
    }

    fn joined(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn url_for(&self, path: &str) -> Result<Url> {
        Ok(Url::parse(&self.joined(path))?)
    }
}

/// `Retry-After` given in seconds.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut collected: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        collected
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    collected
}
