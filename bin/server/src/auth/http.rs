//! Outbound HTTP to identity providers.
//!
//! Every token and identity call goes through [`HttpTransport`], which adds
//! a per-request timeout and retries transient failures a bounded number of
//! times with exponential backoff.

use crate::config::HttpConfig;
use fedgate_sso::SsoError;
use reqwest::{RequestBuilder, Response, StatusCode};
use rootcause::Report;
use std::fmt;
use std::future::Future;
use std::time::Duration;

const USER_AGENT: &str = concat!("fedgate/", env!("CARGO_PKG_VERSION"));

/// Bounded retry parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled after each retry.
    pub initial_delay: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
        }
    }
}

impl From<&HttpConfig> for RetryPolicy {
    fn from(config: &HttpConfig) -> Self {
        Self {
            max_attempts: config.retry_attempts.max(1),
            initial_delay: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

/// Runs `operation` until it succeeds, fails permanently, or runs out of
/// attempts. Only errors for which `is_transient` holds are retried.
pub async fn retry_with_backoff<T, E, F, Fut>(
    operation_name: &str,
    policy: &RetryPolicy,
    is_transient: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    E: fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    let mut delay = policy.initial_delay;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        "provider call succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(e) if is_transient(&e) && attempt < policy.max_attempts => {
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    next_delay_ms = delay.as_millis() as u64,
                    "transient provider failure, will retry"
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Why an outbound request failed.
#[derive(Debug)]
pub enum SendError {
    /// The request could not be built, for example from a malformed URL.
    Build(reqwest::Error),
    /// The request could not be sent or no response arrived in time.
    Request(reqwest::Error),
    /// The provider kept answering with a retryable status.
    Status { status: StatusCode },
    /// The request body cannot be replayed.
    NotReplayable,
}

impl SendError {
    /// Returns true for failures worth another attempt.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(e) => e.is_connect() || e.is_timeout(),
            Self::Status { .. } => true,
            Self::Build(_) | Self::NotReplayable => false,
        }
    }
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build(e) => write!(f, "invalid request: {e}"),
            Self::Request(e) => write!(f, "request failed: {e}"),
            Self::Status { status } => write!(f, "provider responded with {status}"),
            Self::NotReplayable => write!(f, "request body cannot be retried"),
        }
    }
}

impl std::error::Error for SendError {}

fn retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// HTTP client for provider calls.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpTransport {
    /// Builds a transport from configuration.
    ///
    /// Redirects are not followed, as OIDC discovery and token endpoints
    /// must answer directly.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSettings` if the HTTP client cannot be created.
    pub fn new(config: &HttpConfig) -> Result<Self, Report<SsoError>> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SsoError::InvalidSettings {
                details: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            retry: RetryPolicy::from(config),
        })
    }

    /// Returns the underlying client for building requests.
    #[must_use]
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Sends `request`, retrying connect errors, timeouts, 5xx and 429.
    ///
    /// # Errors
    ///
    /// Returns `Build` without sending when the request is malformed, and
    /// the last failure once attempts are exhausted. Other non-2xx
    /// responses are returned as `Ok` for the caller to interpret.
    pub async fn send(&self, operation: &str, request: RequestBuilder) -> Result<Response, SendError> {
        let request = request.build().map_err(SendError::Build)?;
        let client = &self.client;
        retry_with_backoff(operation, &self.retry, SendError::is_transient, || {
            let attempt = request.try_clone();
            async move {
                let request = attempt.ok_or(SendError::NotReplayable)?;
                let response = client.execute(request).await.map_err(SendError::Request)?;
                let status = response.status();
                if retryable_status(status) {
                    return Err(SendError::Status { status });
                }
                Ok(response)
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport() -> HttpTransport {
        HttpTransport::new(&HttpConfig {
            request_timeout_seconds: 5,
            retry_attempts: 3,
            retry_backoff_ms: 0,
        })
        .expect("transport")
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .with_priority(1)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport();
        let request = transport.client().get(format!("{}/user", server.uri()));
        let response = transport.send("user_info", request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let transport = transport();
        let request = transport
            .client()
            .post(format!("{}/token", server.uri()))
            .form(&[("code", "abc")]);
        let err = transport.send("token", request).await.unwrap_err();
        assert!(matches!(
            err,
            SendError::Status {
                status: StatusCode::TOO_MANY_REQUESTS
            }
        ));
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport();
        let request = transport.client().get(server.uri());
        let response = transport.send("user_info", request).await.expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_url_reports_build_error() {
        let transport = transport();
        let request = transport.client().get("not a url/api/userinfo");
        let err = transport.send("user_info", request).await.unwrap_err();
        let SendError::Build(source) = &err else {
            panic!("expected a build error, got {err}");
        };
        assert!(source.is_builder());
        assert!(!err.is_transient());
        assert!(err.to_string().starts_with("invalid request"));
    }

    #[tokio::test]
    async fn permanent_errors_stop_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = retry_with_backoff(
            "op",
            &RetryPolicy {
                max_attempts: 5,
                initial_delay: Duration::ZERO,
            },
            |_| false,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("nope") }
            },
        )
        .await;
        assert_eq!(result, Err("nope"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_retry_policy_makes_one_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> =
            retry_with_backoff("op", &RetryPolicy::none(), |_| true, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("still down") }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
