//! Fetch client with a shared concurrency gate, timeout and retry

use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::error::{ErrorClass, FetchError, TransportError};
use crate::graph::api::Page;
use crate::graph::{HttpTransport, StaticToken, TokenProvider};
use crate::progress::ProgressSink;

/// Retry and timing policy for one logical GET
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first; at least 1
    pub max_attempts: u32,
    /// Pause after a retryable failure
    pub delay: Duration,
    /// Extra pause before the next attempt, to ease off the service
    pub throttle_delay: Duration,
    /// Per-attempt timeout
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
            throttle_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Policy without pauses, for tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay: Duration::ZERO,
            throttle_delay: Duration::ZERO,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Issues authenticated GETs under the run-wide concurrency bound
///
/// The bearer token is looked up before every attempt, so a provider that
/// caches and refreshes tokens keeps long harvests authenticated.
pub struct FetchClient {
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<dyn TokenProvider>,
    gate: Arc<Semaphore>,
    policy: RetryPolicy,
    sink: Arc<dyn ProgressSink>,
}

impl FetchClient {
    /// Default bound on in-flight requests
    pub const DEFAULT_CONCURRENCY: usize = 7;

    /// Create a client with a fixed bearer token
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        bearer: impl Into<String>,
        concurrency: usize,
        policy: RetryPolicy,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self::with_tokens(
            transport,
            Arc::new(StaticToken::new(bearer)),
            concurrency,
            policy,
            sink,
        )
    }

    /// Create a client allowing `concurrency` simultaneous requests
    pub fn with_tokens(
        transport: Arc<dyn HttpTransport>,
        tokens: Arc<dyn TokenProvider>,
        concurrency: usize,
        policy: RetryPolicy,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            transport,
            tokens,
            gate: Arc::new(Semaphore::new(concurrency.max(1))),
            policy,
            sink,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn sink(&self) -> &Arc<dyn ProgressSink> {
        &self.sink
    }

    /// Permits currently free in the concurrency gate
    pub fn available_permits(&self) -> usize {
        self.gate.available_permits()
    }

    /// GET and parse JSON using the policy's attempt budget
    pub async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        self.get_json_with_attempts(url, self.policy.max_attempts)
            .await
    }

    /// GET and decode one `value`/`@odata.nextLink` page
    pub async fn get_page<T: DeserializeOwned>(&self, url: &str) -> Result<Page<T>, FetchError> {
        let value = self.get_json(url).await?;
        serde_json::from_value(value).map_err(FetchError::undecodable)
    }

    /// GET and parse JSON with an explicit attempt budget
    ///
    /// Only [`ErrorClass::Transient`] failures are retried. Capability
    /// rejections are returned at once and logged at debug level only;
    /// whether they matter is the caller's call.
    pub async fn get_json_with_attempts(
        &self,
        url: &str,
        attempts: u32,
    ) -> Result<Value, FetchError> {
        let attempts = attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.attempt(url).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < attempts => {
                    self.sink.warn(&format!(
                        "Request failed ({}); retrying, {} attempt(s) left: {}",
                        err,
                        attempts - attempt,
                        url
                    ));
                    self.pause().await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.class == ErrorClass::CapabilityRejection {
                        debug!("Capability rejection for {}: {}", url, err);
                    } else {
                        self.sink.error(&format!(
                            "Request failed after {} attempt(s) ({}): {}",
                            attempt, err, url
                        ));
                    }
                    return Err(err);
                }
            }
        }
    }

    /// One HTTP exchange, holding a gate permit only while it is in flight
    async fn attempt(&self, url: &str) -> Result<Value, FetchError> {
        let bearer = self.bearer().await?;
        let response = {
            let _permit = self.gate.acquire().await.map_err(|_| {
                FetchError::from_transport(&TransportError::new("request gate closed"))
            })?;

            match tokio::time::timeout(self.policy.timeout, self.transport.get(url, &bearer))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(TransportError::new(format!(
                    "timed out after {}s",
                    self.policy.timeout.as_secs_f32()
                ))),
            }
        };

        let response = response.map_err(|e| FetchError::from_transport(&e))?;
        if response.status != 200 {
            return Err(FetchError::from_status(response.status, &response.body));
        }

        debug!("GET {} -> 200 ({} bytes)", url, response.body.len());
        serde_json::from_str(&response.body).map_err(FetchError::undecodable)
    }

    /// Current bearer token; a refresh may block, so it runs off the executor
    async fn bearer(&self) -> Result<String, FetchError> {
        let tokens = self.tokens.clone();
        let failure = match tokio::task::spawn_blocking(move || tokens.access_token()).await {
            Ok(Ok(token)) => return Ok(token),
            Ok(Err(e)) => TransportError::new(format!("token request failed: {:#}", e)),
            Err(e) => TransportError::new(format!("token task failed: {}", e)),
        };
        Err(FetchError::from_transport(&failure))
    }

    async fn pause(&self) {
        tokio::time::sleep(self.policy.delay).await;
        tokio::time::sleep(self.policy.throttle_delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{FnTransport, HttpResponse};
    use crate::progress::tests::RecordingSink;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn client_with(
        transport: Arc<dyn HttpTransport>,
        attempts: u32,
    ) -> (FetchClient, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let client = FetchClient::new(
            transport,
            "token",
            FetchClient::DEFAULT_CONCURRENCY,
            RetryPolicy::immediate(attempts),
            sink.clone(),
        );
        (client, sink)
    }

    #[tokio::test]
    async fn test_success_returns_json() {
        let transport = Arc::new(FnTransport::new(|_| Ok(HttpResponse::ok(&json!({"value": [1]})))));
        let (client, sink) = client_with(transport.clone(), 3);

        let value = client.get_json("https://graph/x").await.unwrap();
        assert_eq!(value, json!({"value": [1]}));
        assert_eq!(transport.requests().len(), 1);
        assert!(sink.warnings().is_empty());
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let transport = Arc::new(FnTransport::new(move |_| {
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 => Err(TransportError::new("connection reset")),
                1 => Ok(HttpResponse::new(503, "busy")),
                _ => Ok(HttpResponse::ok(&json!({"ok": true}))),
            }
        }));
        let (client, sink) = client_with(transport, 3);

        let value = client.get_json("https://graph/x").await.unwrap();
        assert_eq!(value, json!({"ok": true}));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(sink.warnings().len(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_last_failure() {
        let transport = Arc::new(FnTransport::new(|_| Ok(HttpResponse::new(500, "boom"))));
        let (client, sink) = client_with(transport.clone(), 3);

        let err = client.get_json("https://graph/x").await.unwrap_err();
        assert_eq!(err.status, Some(500));
        assert_eq!(err.body_excerpt, "boom");
        assert_eq!(transport.requests().len(), 3);
        assert_eq!(sink.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_has_no_status() {
        let transport = Arc::new(FnTransport::new(|_| Err(TransportError::new("dns failure"))));
        let (client, _sink) = client_with(transport, 2);

        let err = client.get_json("https://graph/x").await.unwrap_err();
        assert_eq!(err.status, None);
        assert_eq!(err.body_excerpt, "dns failure");
    }

    #[tokio::test]
    async fn test_bad_request_is_not_retried() {
        let transport = Arc::new(FnTransport::new(|_| {
            Ok(HttpResponse::new(
                400,
                r#"{"error":{"message":"Could not find a property named 'size' on type 'microsoft.graph.message'."}}"#,
            ))
        }));
        let (client, sink) = client_with(transport.clone(), 3);

        let err = client.get_json("https://graph/x").await.unwrap_err();
        assert_eq!(err.class, ErrorClass::CapabilityRejection);
        assert_eq!(transport.requests().len(), 1);
        // Capability rejections are the caller's business
        assert!(sink.errors().is_empty());
        assert!(sink.warnings().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_json_is_fatal() {
        let transport = Arc::new(FnTransport::new(|_| Ok(HttpResponse::new(200, "<html>"))));
        let (client, _sink) = client_with(transport.clone(), 3);

        let err = client.get_json("https://graph/x").await.unwrap_err();
        assert_eq!(err.class, ErrorClass::Fatal);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_get_page_decodes_value_and_next_link() {
        let transport = Arc::new(FnTransport::new(|_| {
            Ok(HttpResponse::ok(&json!({
                "value": [{"id": "1"}],
                "@odata.nextLink": "https://graph/next"
            })))
        }));
        let (client, _sink) = client_with(transport, 1);

        let page: Page<Value> = client.get_page("https://graph/x").await.unwrap();
        assert_eq!(page.value.len(), 1);
        assert_eq!(page.next_link.as_deref(), Some("https://graph/next"));
    }

    /// Transport that tracks how many requests overlap
    struct OverlapTransport {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl HttpTransport for OverlapTransport {
        async fn get(&self, _url: &str, _bearer: &str) -> Result<HttpResponse, TransportError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(HttpResponse::ok(&json!({})))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_gate_bounds_in_flight_requests() {
        let transport = Arc::new(OverlapTransport {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let client = Arc::new(FetchClient::new(
            transport.clone(),
            "token",
            3,
            RetryPolicy::immediate(1),
            Arc::new(RecordingSink::default()),
        ));

        let handles: Vec<_> = (0..12)
            .map(|i| {
                let client = client.clone();
                tokio::spawn(async move { client.get_json(&format!("https://graph/{}", i)).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(transport.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(client.available_permits(), 3);
    }

    /// Hands out a new token on every call
    #[derive(Default)]
    struct RotatingTokens {
        issued: AtomicUsize,
    }

    impl TokenProvider for RotatingTokens {
        fn access_token(&self) -> anyhow::Result<String> {
            let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("token-{}", n))
        }
    }

    /// Records the bearer of every request
    #[derive(Default)]
    struct BearerLog {
        seen: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HttpTransport for BearerLog {
        async fn get(&self, _url: &str, bearer: &str) -> Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(bearer.to_string());
            Ok(HttpResponse::ok(&json!({})))
        }
    }

    #[tokio::test]
    async fn test_token_is_looked_up_for_every_attempt() {
        let transport = Arc::new(BearerLog::default());
        let client = FetchClient::with_tokens(
            transport.clone(),
            Arc::new(RotatingTokens::default()),
            1,
            RetryPolicy::immediate(1),
            Arc::new(RecordingSink::default()),
        );

        client.get_json("https://graph/a").await.unwrap();
        client.get_json("https://graph/b").await.unwrap();

        assert_eq!(*transport.seen.lock().unwrap(), vec!["token-1", "token-2"]);
    }

    #[tokio::test]
    async fn test_token_failure_is_retried_as_transport_error() {
        struct Unavailable;

        impl TokenProvider for Unavailable {
            fn access_token(&self) -> anyhow::Result<String> {
                anyhow::bail!("identity platform unreachable")
            }
        }

        let transport = Arc::new(BearerLog::default());
        let sink = Arc::new(RecordingSink::default());
        let client = FetchClient::with_tokens(
            transport.clone(),
            Arc::new(Unavailable),
            1,
            RetryPolicy::immediate(2),
            sink.clone(),
        );

        let err = client.get_json("https://graph/a").await.unwrap_err();
        assert_eq!(err.status, None);
        assert!(err.body_excerpt.contains("identity platform unreachable"));
        assert!(transport.seen.lock().unwrap().is_empty());
        assert_eq!(sink.warnings().len(), 1);
    }

    #[tokio::test]
    async fn test_slow_requests_time_out() {
        struct Stalled;

        #[async_trait]
        impl HttpTransport for Stalled {
            async fn get(&self, _url: &str, _bearer: &str) -> Result<HttpResponse, TransportError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(HttpResponse::ok(&json!({})))
            }
        }

        let policy = RetryPolicy {
            timeout: Duration::from_millis(20),
            ..RetryPolicy::immediate(2)
        };
        let client = FetchClient::new(
            Arc::new(Stalled),
            "token",
            1,
            policy,
            Arc::new(RecordingSink::default()),
        );

        let err = client.get_json("https://graph/x").await.unwrap_err();
        assert_eq!(err.status, None);
        assert!(err.body_excerpt.contains("timed out"));
    }
}
