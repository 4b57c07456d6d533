//! Rate-limit aware call wrapper.
//!
//! Both upstream APIs answer HTTP 429 with an optional `retry-after` header.
//! [`call`] sleeps for the requested interval and re-issues the identical
//! request, up to [`RetryPolicy::max_retries`] times. Every other error is
//! returned untouched on the first failure.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// How a call reacts to HTTP 429.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Wait used when the server sends no usable `retry-after`.
    pub default_retry_after: Duration,
    /// Upper bound on a single wait.
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            default_retry_after: Duration::from_secs(60),
            max_wait: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Wait before the next attempt given the server's hint.
    #[must_use]
    pub fn wait_for(&self, retry_after: Option<Duration>) -> Duration {
        retry_after
            .unwrap_or(self.default_retry_after)
            .min(self.max_wait)
    }
}

/// Errors that can signal an upstream rate limit.
pub trait RateLimitAware: Sized {
    /// Whether this error is an HTTP 429.
    fn is_rate_limited(&self) -> bool;

    /// Server-requested wait, if the response carried a usable one.
    fn retry_after(&self) -> Option<Duration>;

    /// Error returned once the retry budget is spent.
    fn rate_limit_exceeded(attempts: u32) -> Self;
}

/// Parse a `retry-after` header value in whole seconds.
///
/// HTTP-date values are not supported and yield `None`, as does anything
/// else that is not a non-negative integer.
#[must_use]
pub fn parse_retry_after(value: Option<&reqwest::header::HeaderValue>) -> Option<u64> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

/// Run `request`, retrying it while the upstream answers with HTTP 429.
///
/// # Errors
///
/// Returns the first non rate-limit error unchanged, or
/// `E::rate_limit_exceeded` once `policy.max_retries` retries have also been
/// rate limited.
pub async fn call<T, E, F, Fut>(policy: &RetryPolicy, operation: &str, mut request: F) -> Result<T, E>
where
    E: RateLimitAware,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut retries_left = policy.max_retries;
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;

        let error = match request().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_rate_limited() => error,
            Err(error) => return Err(error),
        };

        if retries_left == 0 {
            warn!(operation, attempts, "Rate limit persisted, giving up");
            return Err(E::rate_limit_exceeded(attempts));
        }
        retries_left -= 1;

        let wait = policy.wait_for(error.retry_after());
        warn!(
            operation,
            attempt = attempts,
            retry_after_secs = wait.as_secs(),
            "Rate limit hit, waiting before retrying"
        );
        tokio::time::sleep(wait).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    enum FakeError {
        RateLimited(Option<u64>),
        Exceeded(u32),
        Boom,
    }

    impl RateLimitAware for FakeError {
        fn is_rate_limited(&self) -> bool {
            matches!(self, Self::RateLimited(_))
        }

        fn retry_after(&self) -> Option<Duration> {
            match self {
                Self::RateLimited(secs) => secs.map(Duration::from_secs),
                _ => None,
            }
        }

        fn rate_limit_exceeded(attempts: u32) -> Self {
            Self::Exceeded(attempts)
        }
    }

    /// Replays scripted responses and counts attempts.
    struct Script {
        responses: Mutex<Vec<Result<&'static str, FakeError>>>,
        attempts: Mutex<u32>,
    }

    impl Script {
        fn new(mut responses: Vec<Result<&'static str, FakeError>>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                attempts: Mutex::new(0),
            }
        }

        async fn next(&self) -> Result<&'static str, FakeError> {
            *self.attempts.lock().unwrap() += 1;
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(FakeError::RateLimited(None)))
        }

        fn attempts(&self) -> u32 {
            *self.attempts.lock().unwrap()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_is_returned_without_waiting() {
        let script = Script::new(vec![Ok("done")]);
        let start = tokio::time::Instant::now();

        let result = call(&RetryPolicy::default(), "op", || script.next()).await;

        assert_eq!(result, Ok("done"));
        assert_eq!(script.attempts(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_header_is_honoured() {
        let script = Script::new(vec![Err(FakeError::RateLimited(Some(5))), Ok("retried")]);
        let start = tokio::time::Instant::now();

        let result = call(&RetryPolicy::default(), "op", || script.next()).await;

        assert_eq!(result, Ok("retried"));
        assert_eq!(script.attempts(), 2);
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_retry_after_uses_default() {
        let script = Script::new(vec![Err(FakeError::RateLimited(None)), Ok("retried")]);
        let start = tokio::time::Instant::now();

        let result = call(&RetryPolicy::default(), "op", || script.next()).await;

        assert_eq!(result, Ok("retried"));
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_is_consumed_and_exhausted() {
        let script = Script::new(vec![]);
        let policy = RetryPolicy {
            max_retries: 3,
            default_retry_after: Duration::from_secs(1),
            max_wait: Duration::from_secs(10),
        };

        let result = call(&policy, "op", || script.next()).await;

        assert_eq!(result, Err(FakeError::Exceeded(4)));
        assert_eq!(script.attempts(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_are_not_retried() {
        let script = Script::new(vec![Err(FakeError::Boom), Ok("never")]);

        let result = call(&RetryPolicy::default(), "op", || script.next()).await;

        assert_eq!(result, Err(FakeError::Boom));
        assert_eq!(script.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_budget_fails_on_first_rate_limit() {
        let script = Script::new(vec![Err(FakeError::RateLimited(Some(1))), Ok("never")]);
        let policy = RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        };

        let result = call(&policy, "op", || script.next()).await;

        assert_eq!(result, Err(FakeError::Exceeded(1)));
    }

    #[test]
    fn test_wait_is_clamped() {
        let policy = RetryPolicy {
            max_retries: 3,
            default_retry_after: Duration::from_secs(60),
            max_wait: Duration::from_secs(120),
        };
        assert_eq!(policy.wait_for(Some(Duration::from_secs(5))), Duration::from_secs(5));
        assert_eq!(policy.wait_for(None), Duration::from_secs(60));
        assert_eq!(
            policy.wait_for(Some(Duration::from_secs(86_400))),
            Duration::from_secs(120)
        );
    }

    #[test]
    fn test_parse_retry_after() {
        use reqwest::header::HeaderValue;

        assert_eq!(parse_retry_after(Some(&HeaderValue::from_static("5"))), Some(5));
        assert_eq!(parse_retry_after(Some(&HeaderValue::from_static(" 30 "))), Some(30));
        assert_eq!(
            parse_retry_after(Some(&HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"))),
            None
        );
        assert_eq!(parse_retry_after(None), None);
    }
}
