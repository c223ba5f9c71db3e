//! HTTP seam under the GraphQL client.
//!
//! The client only needs "POST this body, give me status + headers + text".
//! Keeping that behind a trait lets tests script responses without a server.

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, RETRY_AFTER};
use tracing::trace;

use crate::error::RemoteError;

/// A single POST to the GraphQL endpoint.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    /// Serialized `{query, variables}` document.
    pub body: String,
    /// Bearer token, when the credential provider has one.
    pub bearer: Option<String>,
}

/// Raw response; interpretation is left to the client.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Parsed `Retry-After` header (delta-seconds form only).
    pub retry_after: Option<Duration>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal async transport used by [`RemoteClient`](super::RemoteClient).
///
/// Implementations return `RemoteError::Network` for anything that prevented
/// a response from arriving (DNS, refused connection, TLS, timeout).
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, RemoteError>;
}

// =============================================================================
// reqwest Transport
// =============================================================================

/// Production transport on a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a client with a fixed per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wraps an existing client (its timeout settings are kept as-is).
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, RemoteError> {
        let mut builder = self
            .client
            .post(&request.url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(request.body);
        if let Some(token) = request.bearer.as_deref() {
            builder = builder.bearer_auth(token);
        }

        let resp = builder.send().await.map_err(network_error)?;
        let status = resp.status().as_u16();
        let retry_after = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = resp.text().await.map_err(network_error)?;

        trace!(status, bytes = body.len(), "GraphQL response received");
        Ok(HttpResponse {
            status,
            retry_after,
            body,
        })
    }
}

fn network_error(err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Network(format!("request timed out: {err}"))
    } else {
        RemoteError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    const RATE_LIMITED: &str = "HTTP/1.1 429 Too Many Requests\r\n\
        Retry-After: 2\r\n\
        Content-Type: application/json\r\n\
        Content-Length: 2\r\n\
        Connection: close\r\n\r\n{}";

    fn transport(timeout: Duration) -> ReqwestTransport {
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()
            .unwrap();
        ReqwestTransport::from_client(client)
    }

    fn request(url: &str, bearer: Option<&str>) -> HttpRequest {
        HttpRequest {
            url: url.to_string(),
            body: r#"{"query":"{ Viewer { id } }"}"#.to_string(),
            bearer: bearer.map(str::to_string),
        }
    }

    /// Answers one connection with `response` and yields the raw request.
    async fn serve_once(response: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/graphql", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let raw = read_request(&mut socket).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            raw
        });

        (url, server)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut raw = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&raw);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if raw.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8(raw).unwrap()
    }

    #[tokio::test]
    async fn test_rate_limited_response_carries_retry_after() {
        let (url, server) = serve_once(RATE_LIMITED).await;

        let response = transport(Duration::from_secs(5))
            .post(request(&url, Some("secret-token")))
            .await
            .unwrap();

        assert_eq!(response.status, 429);
        assert!(!response.is_success());
        assert_eq!(response.retry_after, Some(Duration::from_secs(2)));
        assert_eq!(response.body, "{}");

        let raw = server.await.unwrap().to_ascii_lowercase();
        assert!(raw.starts_with("post /graphql http/1.1"));
        assert!(raw.contains("authorization: bearer secret-token"));
        assert!(raw.contains("content-type: application/json"));
        assert!(raw.ends_with(r#"{"query":"{ viewer { id } }"}"#));
    }

    #[tokio::test]
    async fn test_anonymous_request_and_http_date_retry_after() {
        let (url, server) = serve_once(
            "HTTP/1.1 200 OK\r\n\
             Retry-After: Wed, 21 Oct 2015 07:28:00 GMT\r\n\
             Content-Length: 11\r\n\
             Connection: close\r\n\r\n{\"data\":{}}",
        )
        .await;

        let response = transport(Duration::from_secs(5))
            .post(request(&url, None))
            .await
            .unwrap();

        assert!(response.is_success());
        assert_eq!(response.retry_after, None);
        assert_eq!(response.body, r#"{"data":{}}"#);

        let raw = server.await.unwrap().to_ascii_lowercase();
        assert!(!raw.contains("authorization:"));
    }

    #[tokio::test]
    async fn test_timeout_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/graphql", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let err = transport(Duration::from_millis(100))
            .post(request(&url, None))
            .await
            .unwrap_err();
        server.abort();

        match err {
            RemoteError::Network(message) => assert!(message.starts_with("request timed out")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_refused_connection_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/graphql", listener.local_addr().unwrap());
        drop(listener);

        let err = transport(Duration::from_secs(5))
            .post(request(&url, None))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Network(_)));
    }
}
