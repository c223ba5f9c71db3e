//! # Remote Client
//!
//! Executes typed GraphQL operations with rate-limit backoff.
//!
//! ## Request Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        execute(operation)                               │
//! │                                                                         │
//! │  encode {query, variables} ─► attach bearer (if any) ─► POST           │
//! │                                                          │              │
//! │            ┌─────────────────────────────────────────────┤              │
//! │            ▼                      ▼                      ▼              │
//! │   transport failure        429 / "Too Many         envelope / body     │
//! │   or timeout               Requests" error                │             │
//! │            │                      │                        ▼             │
//! │            ▼                      ▼               errors? ─► Api        │
//! │       Network (no retry)   retries left?          data?   ─► Ok(T)      │
//! │                             yes: sleep, resend    else    ─► Decoding   │
//! │                             no:  RateLimitExceeded                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::operations::GraphQlOperation;
use super::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use crate::config::ReelConfig;
use crate::error::RemoteError;

/// Supplies the bearer token for each request; `None` sends it unauthenticated.
pub type CredentialProvider = Arc<dyn Fn() -> Option<String> + Send + Sync>;

// =============================================================================
// Retry Policy
// =============================================================================

/// Backoff parameters for rate-limited requests.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first rate-limited attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    /// Cap for every delay, `Retry-After` included.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ReelConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ReelConfig) -> Self {
        RetryPolicy {
            max_retries: config.retry.max_rate_limit_retries,
            base_delay: Duration::from_millis(config.retry.base_delay_ms),
            multiplier: config.retry.multiplier,
            max_delay: Duration::from_secs(config.retry.max_delay_secs),
        }
    }

    /// Deterministic exponential schedule; the retry count, not elapsed time,
    /// bounds the loop.
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.base_delay,
            initial_interval: self.base_delay,
            randomization_factor: 0.0,
            multiplier: self.multiplier,
            max_interval: self.max_delay,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

// =============================================================================
// Wire Envelope
// =============================================================================

#[derive(Serialize)]
struct GraphQlRequest<'a, V: Serialize> {
    query: &'static str,
    variables: &'a V,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    errors: Vec<GraphQlErrorBody>,
}

#[derive(Deserialize)]
struct GraphQlErrorBody {
    message: String,
    #[serde(default)]
    status: Option<u16>,
}

impl GraphQlErrorBody {
    fn is_rate_limit(&self) -> bool {
        self.status == Some(429) || self.message.contains("Too Many Requests")
    }
}

/// What one HTTP exchange amounted to.
enum Outcome<T> {
    RateLimited,
    Done(Result<T, RemoteError>),
}

fn interpret<T: serde::de::DeserializeOwned>(response: &HttpResponse) -> Outcome<T> {
    if response.status == 429 {
        return Outcome::RateLimited;
    }

    let envelope = match serde_json::from_str::<GraphQlResponse>(&response.body) {
        Ok(envelope) => envelope,
        Err(err) if response.is_success() => {
            return Outcome::Done(Err(RemoteError::Decoding(err.to_string())));
        }
        Err(_) => {
            let body = response.body.trim();
            let message = if body.is_empty() {
                format!("HTTP {}", response.status)
            } else {
                body.to_string()
            };
            return Outcome::Done(Err(RemoteError::Api {
                message,
                status_code: Some(response.status),
            }));
        }
    };

    if !envelope.errors.is_empty() {
        if envelope.errors.iter().any(GraphQlErrorBody::is_rate_limit) {
            return Outcome::RateLimited;
        }
        let message = envelope
            .errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let status_code = envelope
            .errors
            .iter()
            .find_map(|e| e.status)
            .or_else(|| (!response.is_success()).then_some(response.status));
        return Outcome::Done(Err(RemoteError::Api {
            message,
            status_code,
        }));
    }

    if !response.is_success() {
        return Outcome::Done(Err(RemoteError::Api {
            message: format!("HTTP {}", response.status),
            status_code: Some(response.status),
        }));
    }

    let result = match envelope.data {
        Some(data) => {
            serde_json::from_value(data).map_err(|e| RemoteError::Decoding(e.to_string()))
        }
        None => Err(RemoteError::Decoding("response has no data".to_string())),
    };
    Outcome::Done(result)
}

// =============================================================================
// Remote Client
// =============================================================================

struct ClientInner {
    endpoint: String,
    transport: Arc<dyn HttpTransport>,
    credentials: CredentialProvider,
    policy: RetryPolicy,
}

/// GraphQL client for the remote list service.
///
/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct RemoteClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClient")
            .field("endpoint", &self.inner.endpoint)
            .field("policy", &self.inner.policy)
            .finish_non_exhaustive()
    }
}

impl RemoteClient {
    pub fn new(
        endpoint: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
        credentials: CredentialProvider,
        policy: RetryPolicy,
    ) -> Self {
        RemoteClient {
            inner: Arc::new(ClientInner {
                endpoint: endpoint.into(),
                transport,
                credentials,
                policy,
            }),
        }
    }

    /// Builds a client on the reqwest transport from configuration.
    pub fn from_config(
        config: &ReelConfig,
        credentials: CredentialProvider,
    ) -> Result<Self, RemoteError> {
        let transport = ReqwestTransport::new(config.request_timeout())?;
        Ok(Self::new(
            config.remote.endpoint.clone(),
            Arc::new(transport),
            credentials,
            RetryPolicy::from_config(config),
        ))
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    /// Sends `operation` and decodes its `data`.
    ///
    /// Rate limits are retried up to `max_retries` times; every other
    /// failure is returned as-is on the first occurrence.
    pub async fn execute<O: GraphQlOperation>(
        &self,
        operation: &O,
    ) -> Result<O::Response, RemoteError> {
        let body = serde_json::to_string(&GraphQlRequest {
            query: O::QUERY,
            variables: operation,
        })
        .map_err(|e| RemoteError::Decoding(format!("failed to encode request: {e}")))?;

        let policy = &self.inner.policy;
        let mut schedule = policy.backoff();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let request = HttpRequest {
                url: self.inner.endpoint.clone(),
                body: body.clone(),
                bearer: (self.inner.credentials)(),
            };

            debug!(operation = O::NAME, attempt, "Sending GraphQL request");
            let response = self.inner.transport.post(request).await?;

            match interpret::<O::Response>(&response) {
                Outcome::Done(result) => return result,
                Outcome::RateLimited if attempt > policy.max_retries => {
                    warn!(
                        operation = O::NAME,
                        attempts = attempt,
                        "Rate limit retry budget exhausted"
                    );
                    return Err(RemoteError::RateLimitExceeded { attempts: attempt });
                }
                Outcome::RateLimited => {
                    let mut delay = schedule.next_backoff().unwrap_or(policy.max_delay);
                    if let Some(retry_after) = response.retry_after {
                        delay = delay.max(retry_after);
                    }
                    let delay = delay.min(policy.max_delay);

                    warn!(
                        operation = O::NAME,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
