//! Retry policy for outbound calls.

use reqwest::Method;
use std::time::Duration;
use swagent_core::RetryConfig;

/// Statuses retried by default.
pub const DEFAULT_RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Exponential backoff: `initial * multiplier^(retry - 1)`, capped at `max`.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    pub initial: Duration,
    pub multiplier: f64,
    pub max: Duration,
}

impl Backoff {
    /// Delay before the given retry (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let nanos = (self.initial.as_nanos() as f64 * self.multiplier.powi(exponent)).round();
        if !nanos.is_finite() || nanos >= self.max.as_nanos() as f64 {
            return self.max;
        }
        Duration::from_nanos(nanos.max(0.0) as u64)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            multiplier: 2.0,
            max: Duration::from_secs(30),
        }
    }
}

/// Which requests are retried, on what, and how long to wait.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Methods eligible for any retry
    pub retry_methods: Vec<Method>,
    pub retry_statuses: Vec<u16>,
    pub backoff: Backoff,
    /// Also retry connection failures for eligible methods
    pub retry_connect_errors: bool,
    /// Honor a `Retry-After` header in seconds, capped by `backoff.max`
    pub respect_retry_after: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_methods: vec![
                Method::GET,
                Method::HEAD,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
                Method::TRACE,
            ],
            retry_statuses: DEFAULT_RETRY_STATUSES.to_vec(),
            backoff: Backoff::default(),
            retry_connect_errors: true,
            respect_retry_after: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.retry_statuses = statuses.into_iter().collect();
        self
    }

    pub fn with_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.retry_methods = methods.into_iter().collect();
        self
    }

    pub fn with_connect_retries(mut self, enabled: bool) -> Self {
        self.retry_connect_errors = enabled;
        self
    }

    /// Total attempts allowed, first one included.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn allows_method(&self, method: &Method) -> bool {
        self.retry_methods.contains(method)
    }

    /// Whether a response with `status` should be retried after `attempt`
    /// attempts have been made.
    pub fn should_retry_status(&self, method: &Method, status: u16, attempt: u32) -> bool {
        attempt < self.max_attempts()
            && self.allows_method(method)
            && self.retry_statuses.contains(&status)
    }

    /// Whether a transport failure should be retried. Only connection
    /// failures qualify.
    pub fn should_retry_transport(&self, method: &Method, is_connect: bool, attempt: u32) -> bool {
        is_connect
            && self.retry_connect_errors
            && attempt < self.max_attempts()
            && self.allows_method(method)
    }

    /// Delay before the given retry (1-based), lengthened by `retry_after`
    /// when the policy honors it.
    pub fn delay_for(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        let computed = self.backoff.delay(retry);
        match retry_after {
            Some(hint) if self.respect_retry_after => hint.max(computed).min(self.backoff.max),
            _ => computed,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: Backoff {
                initial: Duration::from_millis(config.initial_backoff_ms),
                multiplier: config.backoff_multiplier,
                max: Duration::from_millis(config.max_backoff_ms),
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let backoff = Backoff {
            initial: Duration::from_millis(100),
            multiplier: 2.0,
            max: Duration::from_millis(500),
        };
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(400));
        assert_eq!(backoff.delay(4), Duration::from_millis(500));
        assert_eq!(backoff.delay(200), Duration::from_millis(500));
    }

    #[test]
    fn test_only_idempotent_methods_retry() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry_status(&Method::GET, 503, 1));
        assert!(policy.should_retry_status(&Method::DELETE, 429, 1));
        assert!(!policy.should_retry_status(&Method::POST, 503, 1));
        assert!(!policy.should_retry_status(&Method::PATCH, 503, 1));
        assert!(!policy.should_retry_status(&Method::GET, 404, 1));
    }

    #[test]
    fn test_attempt_ceiling() {
        let policy = RetryPolicy::default().with_max_retries(2);
        assert_eq!(policy.max_attempts(), 3);
        assert!(policy.should_retry_status(&Method::GET, 500, 2));
        assert!(!policy.should_retry_status(&Method::GET, 500, 3));
        assert!(!RetryPolicy::none().should_retry_status(&Method::GET, 500, 1));
    }

    #[test]
    fn test_transport_retries_only_for_connect_failures() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry_transport(&Method::GET, true, 1));
        assert!(!policy.should_retry_transport(&Method::GET, false, 1));
        assert!(!policy.should_retry_transport(&Method::POST, true, 1));
        assert!(
            !policy
                .with_connect_retries(false)
                .should_retry_transport(&Method::GET, true, 1)
        );
    }

    #[test]
    fn test_retry_after_is_capped() {
        let policy = RetryPolicy::default().with_backoff(Backoff {
            initial: Duration::from_millis(10),
            multiplier: 2.0,
            max: Duration::from_secs(2),
        });
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(1))),
            Duration::from_secs(1)
        );
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(60))),
            Duration::from_secs(2)
        );
        assert_eq!(policy.delay_for(1, None), Duration::from_millis(10));
    }

    #[test]
    fn test_from_retry_config() {
        let policy = RetryPolicy::from(&RetryConfig::default());
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.backoff.initial, Duration::from_secs(1));
        assert_eq!(policy.backoff.max, Duration::from_secs(30));
        assert_eq!(policy.retry_statuses, DEFAULT_RETRY_STATUSES.to_vec());
    }
}
