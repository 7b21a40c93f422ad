// Retry-aware request executor.
// Sends one logical request, classifying each attempt and backing off between retries.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{FetchError, Result, is_retryable_status};

use super::rate_limit::RateLimit;
use super::request::RequestSpec;
use super::response::{self as interpret, RawResponse};

/// Default timeout applied when the request does not set one.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Attempt limits and backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts for idempotent requests, including the first one.
    pub max_attempts: u32,
    /// Linear backoff step: attempt `n` is followed by a `n * base_delay` pause.
    pub base_delay: Duration,
    /// Upper bound for honoring a server Retry-After hint.
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_retry_after: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Pause after the failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let base = self.base_delay.saturating_mul(attempt);
        match retry_after {
            Some(hint) => base.max(hint.min(self.max_retry_after)),
            None => base,
        }
    }
}

/// Outcome of a single attempt.
#[derive(Debug)]
pub enum RetryDecision {
    Success(RawResponse),
    Retryable {
        error: FetchError,
        retry_after: Option<Duration>,
    },
    Fatal(FetchError),
}

/// Run `future` unless `cancel` fires first.
pub(crate) async fn cancellable<F: Future>(
    cancel: Option<&CancellationToken>,
    future: F,
) -> Result<F::Output> {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(FetchError::Cancelled),
            output = future => Ok(output),
        },
        None => Ok(future.await),
    }
}

/// Sends requests with retries, backoff and bounded error diagnostics.
#[derive(Debug, Clone)]
pub struct Executor {
    client: Client,
    policy: RetryPolicy,
    default_timeout: Duration,
    label: String,
    credential: Option<String>,
    docs_url: Option<String>,
}

impl Executor {
    pub fn new(client: Client, policy: RetryPolicy) -> Self {
        Self {
            client,
            policy,
            default_timeout: DEFAULT_REQUEST_TIMEOUT,
            label: "HTTP request".to_string(),
            credential: None,
            docs_url: None,
        }
    }

    /// Prefix of every failure message, e.g. "GitHub REST API request".
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Name of the credential suggested when an unauthenticated request runs
    /// out of rate limit, e.g. "GitHub REST API token". No hint without it.
    pub fn with_credential_hint(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Documentation link appended to the missing-credential hint.
    pub fn with_docs_url(mut self, docs_url: Option<String>) -> Self {
        self.docs_url = docs_url;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send `request`, retrying idempotent requests on transient failures.
    pub async fn send(
        &self,
        request: &RequestSpec,
        cancel: Option<&CancellationToken>,
    ) -> Result<RawResponse> {
        let retries_allowed = request.is_idempotent();
        let max_attempts = if retries_allowed {
            self.policy.max_attempts.max(1)
        } else {
            1
        };

        let mut attempt = 1;
        loop {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(FetchError::Cancelled);
            }

            debug!(
                method = %request.method(),
                url = %request.url(),
                attempt,
                max_attempts,
                "sending request"
            );

            match self.attempt(request, retries_allowed, cancel).await {
                RetryDecision::Success(response) => return Ok(response),
                RetryDecision::Fatal(error) => return Err(error),
                RetryDecision::Retryable { error, retry_after } => {
                    if attempt >= max_attempts {
                        return Err(error);
                    }

                    let delay = self.policy.delay_for(attempt, retry_after);
                    warn!(
                        url = %request.url(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        reason = %error,
                        "retrying request"
                    );
                    cancellable(cancel, tokio::time::sleep(delay)).await?;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(
        &self,
        request: &RequestSpec,
        retries_allowed: bool,
        cancel: Option<&CancellationToken>,
    ) -> RetryDecision {
        let call = async {
            let response = request.build(&self.client, self.default_timeout).send().await?;
            RawResponse::read(response).await
        };

        match cancellable(cancel, call).await {
            Err(cancelled) => RetryDecision::Fatal(cancelled),
            Ok(Err(source)) => {
                let error = FetchError::Transport {
                    message: format!(
                        "Failed to send {}: {} {}",
                        self.label,
                        request.method(),
                        request.url()
                    ),
                    source,
                };
                if retries_allowed {
                    RetryDecision::Retryable {
                        error,
                        retry_after: None,
                    }
                } else {
                    RetryDecision::Fatal(error)
                }
            }
            Ok(Ok(response)) => self.classify(request, response, retries_allowed),
        }
    }

    /// Turn a received response into an attempt outcome.
    pub fn classify(
        &self,
        request: &RequestSpec,
        response: RawResponse,
        retries_allowed: bool,
    ) -> RetryDecision {
        let status = response.status;
        if status.as_u16() < 300 {
            return RetryDecision::Success(response);
        }

        let message = self.failure_message(request, &response);
        if retries_allowed && is_retryable_status(status) {
            RetryDecision::Retryable {
                error: FetchError::RetriesExhausted { status, message },
                retry_after: interpret::retry_after(&response.headers, Utc::now()),
            }
        } else {
            RetryDecision::Fatal(FetchError::Status { status, message })
        }
    }

    fn failure_message(&self, request: &RequestSpec, response: &RawResponse) -> String {
        let mut lines = vec![format!(
            "{} {} {} failed with status code {}.",
            self.label,
            request.method(),
            request.url(),
            response.status.as_u16()
        )];

        if let Some(credential) = &self.credential {
            let rate_limit = RateLimit::from_headers(&response.headers);
            if rate_limit.is_exhausted() && !request.is_authenticated() {
                let mut hint = format!(
                    "Rate limit exceeded, consider setting a {}, which is not set right now.",
                    credential
                );
                if let Some(reset_at) = rate_limit.reset_at() {
                    hint.push_str(&format!(" Limit resets at {} UTC.", reset_at));
                }
                if let Some(docs_url) = &self.docs_url {
                    hint.push_str(&format!(" See {}#configuration .", docs_url));
                }
                lines.push(hint);
            }
        }

        lines.push(interpret::render_body(response));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use reqwest::{
        Method, StatusCode,
        header::{HeaderMap, HeaderValue},
    };

    use super::*;
    use crate::http::AuthScheme;

    fn executor() -> Executor {
        Executor::new(Client::new(), RetryPolicy::default()).with_label("GitHub REST API request")
    }

    fn request() -> RequestSpec {
        RequestSpec::get("https://api.github.com/repos/org/repo").unwrap()
    }

    fn response(status: u16, headers: &[(&'static str, &'static str)], body: &'static str) -> RawResponse {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.append(*name, HeaderValue::from_static(*value));
        }
        RawResponse::new(
            StatusCode::from_u16(status).unwrap(),
            map,
            Bytes::from_static(body.as_bytes()),
        )
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_retry_after, Duration::from_secs(10));
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1, None), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2, None), Duration::from_secs(2));
        assert_eq!(policy.delay_for(4, None), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_honors_bounded_retry_after() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1, Some(Duration::from_secs(5))), Duration::from_secs(5));
        assert_eq!(policy.delay_for(1, Some(Duration::from_secs(30))), Duration::from_secs(10));
        // A hint shorter than the linear step never shortens the wait.
        assert_eq!(policy.delay_for(3, Some(Duration::from_secs(1))), Duration::from_secs(3));
        assert_eq!(policy.delay_for(2, Some(Duration::ZERO)), Duration::from_secs(2));
    }

    #[test]
    fn test_classify_success() {
        let decision = executor().classify(&request(), response(204, &[], ""), true);
        assert!(matches!(decision, RetryDecision::Success(_)));
    }

    #[test]
    fn test_classify_retryable_with_hint() {
        let decision = executor().classify(
            &request(),
            response(429, &[("retry-after", "5")], ""),
            true,
        );
        match decision {
            RetryDecision::Retryable { error, retry_after } => {
                assert_eq!(retry_after, Some(Duration::from_secs(5)));
                assert_eq!(error.status(), Some(StatusCode::TOO_MANY_REQUESTS));
            }
            other => panic!("expected retryable, got {:?}", other),
        }

        let decision = executor().classify(&request(), response(503, &[], ""), true);
        assert!(matches!(
            decision,
            RetryDecision::Retryable {
                retry_after: None,
                ..
            }
        ));
    }

    #[test]
    fn test_classify_fatal_statuses() {
        for status in [301, 400, 401, 403, 404, 422] {
            let decision = executor().classify(&request(), response(status, &[], ""), true);
            assert!(
                matches!(decision, RetryDecision::Fatal(FetchError::Status { .. })),
                "status {} should be fatal",
                status
            );
        }
    }

    #[test]
    fn test_retryable_status_is_fatal_without_retries() {
        let decision = executor().classify(&request(), response(500, &[], ""), false);
        assert!(matches!(
            decision,
            RetryDecision::Fatal(FetchError::Status { .. })
        ));
    }

    #[test]
    fn test_failure_message_contents() {
        let decision = executor().classify(
            &request(),
            response(404, &[("content-type", "application/json")], r#"{"message":"Not Found"}"#),
            true,
        );
        let RetryDecision::Fatal(error) = decision else {
            panic!("expected fatal");
        };
        assert_eq!(
            error.to_string(),
            "GitHub REST API request GET https://api.github.com/repos/org/repo failed with status code 404.\n\
             Response body:\n{\"message\":\"Not Found\"}\n"
        );
    }

    #[test]
    fn test_rate_limit_hint_only_when_unauthenticated() {
        let headers = [
            ("x-ratelimit-remaining", "0"),
            ("x-ratelimit-reset", "1700000000"),
            ("content-type", "application/json"),
        ];
        let executor = executor()
            .with_credential_hint("GitHub REST API token")
            .with_docs_url(Some("https://example.com/docs".into()));

        let decision = executor.classify(
            &request(),
            response(429, &headers, r#"{"message":"rate limited"}"#),
            true,
        );
        let RetryDecision::Retryable { error, .. } = decision else {
            panic!("expected retryable");
        };
        let message = error.to_string();
        assert!(message.contains(
            "\nRate limit exceeded, consider setting a GitHub REST API token, \
             which is not set right now. Limit resets at 22:13:20 UTC. \
             See https://example.com/docs#configuration .\n"
        ));
        assert!(message.contains("rate limited"));

        let authenticated = request().authorization(AuthScheme::Bearer, "secret").unwrap();
        let decision = executor.classify(
            &authenticated,
            response(429, &headers, r#"{"message":"rate limited"}"#),
            true,
        );
        let RetryDecision::Retryable { error, .. } = decision else {
            panic!("expected retryable");
        };
        assert!(!error.to_string().contains("Rate limit exceeded"));
    }

    #[test]
    fn test_no_rate_limit_hint_without_credential_name() {
        let decision = executor().classify(
            &request(),
            response(403, &[("x-ratelimit-remaining", "0")], ""),
            true,
        );
        let RetryDecision::Fatal(error) = decision else {
            panic!("expected fatal");
        };
        assert!(!error.to_string().contains("Rate limit exceeded"));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = executor().send(&request(), Some(&cancel)).await;
        assert!(matches!(result, Err(FetchError::Cancelled)));
    }

    #[tokio::test]
    async fn test_non_idempotent_transport_failure_is_not_retried() {
        // Nothing listens on port 9 of the loopback interface.
        let request = RequestSpec::new(Method::POST, "http://127.0.0.1:9/")
            .unwrap()
            .timeout(Duration::from_secs(2));
        let result = executor().send(&request, None).await;
        match result {
            Err(error @ FetchError::Transport { .. }) => {
                assert!(error.to_string().starts_with(
                    "Failed to send GitHub REST API request: POST http://127.0.0.1:9/"
                ));
            }
            other => panic!("expected transport error, got {:?}", other),
        }
    }
}
