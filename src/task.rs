//! The refresh task: one keep-alive POST, retried until it succeeds or the
//! retry policy gives up.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::headers::{browser_headers, DEFAULT_ORIGIN};
use crate::retry::{FixedDelayPolicy, RetryPolicy};
use crate::types::{truncate_chars, ERROR_BODY_PREVIEW_CHARS};
use crate::{
    CredentialSource, HttpTransport, KeepAliveConfig, KeepAliveError, RefreshOptions,
    RefreshOutcome, RefreshRequest, RefreshResponse, Result, Transport, UrlCheck,
};

#[derive(Clone)]
pub struct RefreshTask {
    transport: Arc<dyn Transport>,
    policy: Arc<dyn RetryPolicy>,
    url: String,
    origin: String,
    credential: CredentialSource,
    expected_url: Option<String>,
    timeout: Duration,
}

impl fmt::Debug for RefreshTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshTask")
            .field("url", &self.url)
            .field("origin", &self.origin)
            .field("credential", &self.credential)
            .field("expected_url", &self.expected_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RefreshTask {
    /// Creates a task for `url` with default options and the default cookie.
    pub fn new(url: impl Into<String>, transport: impl Transport + 'static) -> Self {
        let options = RefreshOptions::default();
        Self {
            transport: Arc::new(transport),
            policy: Arc::new(FixedDelayPolicy::from(&options)),
            url: url.into(),
            origin: DEFAULT_ORIGIN.to_owned(),
            credential: CredentialSource::default(),
            expected_url: None,
            timeout: Duration::from_millis(options.timeout_ms),
        }
    }

    /// Builds a task that talks HTTP through `reqwest`.
    pub fn from_config(config: &KeepAliveConfig) -> Self {
        Self::new(config.url.clone(), HttpTransport::new())
            .with_origin(config.origin.clone())
            .with_credential(config.credential.clone())
            .with_expected_url(config.expected_url.clone())
            .with_options(&config.options)
    }

    pub fn with_credential(mut self, credential: CredentialSource) -> Self {
        self.credential = credential;
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn with_expected_url(mut self, expected_url: Option<String>) -> Self {
        self.expected_url = expected_url;
        self
    }

    /// Applies the deadline and replaces the policy with a [`FixedDelayPolicy`].
    pub fn with_options(mut self, options: &RefreshOptions) -> Self {
        self.timeout = Duration::from_millis(options.timeout_ms);
        self.policy = Arc::new(FixedDelayPolicy::from(options));
        self
    }

    pub fn with_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Resolves the cookie and assembles the request for the next attempt.
    pub fn build_request(&self) -> Result<RefreshRequest> {
        let cookie = self.credential.resolve()?;
        Ok(RefreshRequest {
            url: self.url.clone(),
            headers: browser_headers(&self.origin, &cookie),
        })
    }

    /// Runs attempts until one returns a 2xx status or the policy stops.
    ///
    /// With the default policy this only returns on success.
    pub async fn run(&self) -> Result<RefreshOutcome> {
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            info!(url = %self.url, attempt, "sending keep-alive request");

            let failure = match self.attempt().await {
                Ok(response) if response.is_success() => {
                    return Ok(self.on_success(response, attempt));
                }
                Ok(response) => {
                    let preview = truncate_chars(&response.body, ERROR_BODY_PREVIEW_CHARS);
                    error!(
                        status = response.status,
                        "request failed: {}", response.status_line()
                    );
                    error!("error response body (first {ERROR_BODY_PREVIEW_CHARS} chars): {preview}");
                    KeepAliveError::Http {
                        status: response.status,
                        body: preview.to_owned(),
                    }
                }
                Err(err) => {
                    if err.is_timeout() {
                        error!(
                            timeout_ms = self.timeout.as_millis() as u64,
                            "request timed out"
                        );
                    } else {
                        error!(error = %err, "request raised an error");
                    }
                    err
                }
            };

            match self.policy.next_delay(attempt, &failure) {
                Some(delay) if delay.is_zero() => {
                    info!(attempt, "retrying immediately");
                }
                Some(delay) => {
                    info!(attempt, delay_ms = delay.as_millis() as u64, "retrying after delay");
                    sleep(delay).await;
                }
                None => {
                    warn!(attempt, error = %failure, "giving up on this refresh");
                    return Err(failure);
                }
            }
        }
    }

    /// One attempt under the deadline. The timer and the in-flight request are
    /// dropped together when this returns, whichever way it settles.
    async fn attempt(&self) -> Result<RefreshResponse> {
        let request = self.build_request()?;

        info!("outgoing request headers:");
        for (name, value) in request.redacted_headers() {
            info!("  {name}: {value}");
        }

        let response = timeout(self.timeout, self.transport.send(&request))
            .await
            .map_err(|_| KeepAliveError::Timeout {
                after_ms: self.timeout.as_millis() as u64,
            })??;

        info!(status = response.status, "response status: {}", response.status_line());
        info!(url = %response.url, "response URL (after redirects)");
        debug!("response headers: {}", response.headers_json());
        Ok(response)
    }

    fn on_success(&self, response: RefreshResponse, attempts: usize) -> RefreshOutcome {
        let content_length = response.body.chars().count();
        info!(content_length, "content length: {content_length} chars");

        let url_check = UrlCheck::evaluate(self.expected_url.as_deref(), &response.url);
        match &url_check {
            UrlCheck::Matched => {
                info!("request succeeded and reached the expected page");
            }
            UrlCheck::Mismatched { expected, actual } => {
                warn!(
                    %expected,
                    %actual,
                    "request succeeded but the final URL differs from the expected one; check redirects"
                );
            }
            UrlCheck::Unconfigured => {
                warn!("request succeeded but no expected URL is configured; landing page not verified");
            }
        }

        RefreshOutcome {
            attempts,
            status: response.status,
            final_url: response.url,
            content_length,
            url_check,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use tokio::time::Instant;

    use super::RefreshTask;
    use crate::retry::RetryPolicy;
    use crate::test_support::{ScriptedTransport, Step};
    use crate::{CredentialSource, KeepAliveError, RefreshOptions, UrlCheck};

    const URL: &str = "https://editor.example.test/?mode=edit";

    fn task(transport: &ScriptedTransport) -> RefreshTask {
        RefreshTask::new(URL, transport.clone())
            .with_credential(CredentialSource::Inline("session=abc".to_owned()))
    }

    #[tokio::test(start_paused = true)]
    async fn success_logs_length_and_does_not_retry() {
        let transport = ScriptedTransport::new([Step::ok("hello world")]);

        let outcome = task(&transport).run().await.expect("refresh must succeed");

        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.status, 200);
        assert_eq!(outcome.content_length, 11);
        assert_eq!(outcome.url_check, UrlCheck::Unconfigured);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn url_mismatch_still_counts_as_success() {
        let transport = ScriptedTransport::new([Step::ok("body")]);

        let outcome = task(&transport)
            .with_expected_url(Some("https://elsewhere.test/".to_owned()))
            .run()
            .await
            .expect("refresh must succeed");

        assert!(matches!(outcome.url_check, UrlCheck::Mismatched { .. }));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn non_success_status_retries_once_without_delay() {
        let transport = ScriptedTransport::new([Step::status(403, "forbidden"), Step::ok("ok")]);
        let started = Instant::now();

        let outcome = task(&transport).run().await.expect("second attempt succeeds");

        assert_eq!(outcome.attempts, 2);
        assert_eq!(transport.calls(), 2);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_retries_after_one_second() {
        let transport = ScriptedTransport::new([Step::transport_error(), Step::ok("ok")]);
        let started = Instant::now();

        let outcome = task(&transport).run().await.expect("retry succeeds");

        let elapsed = started.elapsed();
        assert_eq!(outcome.attempts, 2);
        assert_eq!(transport.calls(), 2);
        assert!(elapsed >= Duration::from_secs(1), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(1_050), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expiry_is_retried_like_a_transport_error() {
        let transport = ScriptedTransport::new([Step::Hang, Step::ok("ok")]);
        let started = Instant::now();

        let outcome = task(&transport).run().await.expect("retry succeeds");

        let elapsed = started.elapsed();
        assert_eq!(outcome.attempts, 2);
        assert!(elapsed >= Duration::from_secs(31), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(31_050), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_request_is_released_once_per_attempt() {
        let transport = ScriptedTransport::new([
            Step::Hang,
            Step::transport_error(),
            Step::status(500, "boom"),
            Step::ok("ok"),
        ]);

        task(&transport).run().await.expect("final attempt succeeds");

        assert_eq!(transport.calls(), 4);
        assert_eq!(transport.released.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_policy_returns_last_failure() {
        let transport = ScriptedTransport::new([
            Step::status(502, "a"),
            Step::status(502, "b"),
            Step::status(502, "c"),
        ]);

        let err = task(&transport)
            .with_options(&RefreshOptions {
                max_attempts: Some(2),
                ..RefreshOptions::default()
            })
            .run()
            .await
            .expect_err("policy must give up");

        assert_eq!(transport.calls(), 2);
        match err {
            KeepAliveError::Http { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body, "b");
            }
            other => panic!("expected http error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn client_error_stops_when_configured() {
        let transport = ScriptedTransport::new([Step::status(401, "login"), Step::ok("ok")]);

        let err = task(&transport)
            .with_options(&RefreshOptions {
                retry_on_client_error: false,
                ..RefreshOptions::default()
            })
            .run()
            .await
            .expect_err("401 must be terminal");

        assert!(err.is_client_error());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn error_body_is_truncated_to_preview_length() {
        let long_body = "x".repeat(2_000);
        let transport = ScriptedTransport::new([Step::status(500, &long_body)]);

        let err = task(&transport)
            .with_options(&RefreshOptions {
                max_attempts: Some(1),
                ..RefreshOptions::default()
            })
            .run()
            .await
            .expect_err("single attempt must fail");

        match err {
            KeepAliveError::Http { body, .. } => assert_eq!(body.len(), 500),
            other => panic!("expected http error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unreadable_cookie_is_retried_after_delay_and_then_picked_up() {
        let dir = tempfile::tempdir().expect("must create temp dir");
        let cookie_path = dir.path().join("cookie.txt");
        let transport = ScriptedTransport::new([Step::ok("ok")]);
        let task = RefreshTask::new(URL, transport.clone())
            .with_credential(CredentialSource::File(cookie_path.clone()));

        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            std::fs::write(&cookie_path, "session=rotated").expect("must write cookie");
        });

        let outcome = task.run().await.expect("second attempt has a cookie");
        writer.await.expect("writer task must finish");

        assert_eq!(outcome.attempts, 2);
        assert_eq!(transport.calls(), 1);
        let sent = transport.requests();
        assert_eq!(sent[0].header("cookie"), Some("session=rotated"));
    }

    #[tokio::test(start_paused = true)]
    async fn custom_policy_controls_the_chain() {
        struct OneRetry;

        impl RetryPolicy for OneRetry {
            fn next_delay(&self, attempt: usize, _failure: &KeepAliveError) -> Option<Duration> {
                (attempt < 2).then_some(Duration::from_secs(5))
            }
        }

        let transport = ScriptedTransport::new([Step::status(503, "a"), Step::status(503, "b")]);
        let started = Instant::now();

        let err = task(&transport)
            .with_policy(OneRetry)
            .run()
            .await
            .expect_err("policy allows only two attempts");

        assert_eq!(err.status(), Some(503));
        assert_eq!(transport.calls(), 2);
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[test]
    fn request_carries_browser_headers_and_cookie() {
        let transport = ScriptedTransport::default();
        let request = task(&transport)
            .with_origin("https://origin.example.test")
            .build_request()
            .expect("inline cookie resolves");

        assert_eq!(request.url, URL);
        assert_eq!(request.header("Cookie"), Some("session=abc"));
        assert_eq!(request.header("origin"), Some("https://origin.example.test"));
        assert_eq!(request.header("content-length"), Some("0"));
    }
}
