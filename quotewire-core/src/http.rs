//! HTTP transport seam used by adapters.
//!
//! Adapters talk to the wire through [`HttpTransport`] so tests can
//! substitute a scripted fake for the real client. The production
//! implementation wraps a pooled `reqwest::Client`; it reads the body fully
//! on every status so the connection is returned to the pool on success and
//! error paths alike, and it races every request against the caller's
//! cancellation token.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const POOL_MAX_IDLE_PER_HOST: usize = 10;

/// A GET request: URL plus headers. Vendor APIs in this workspace are
/// query-string driven, so no body or method field is carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Fully built request URL, including query parameters.
    pub url: String,
    /// Extra headers (e.g. `Authorization`).
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    /// Build a GET request for `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Attach a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A response with its body fully read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// The complete response body.
    pub body: String,
}

impl HttpResponse {
    /// Build a 200 response around a JSON body (handy in tests).
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    /// Build a response with an arbitrary status.
    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Transport-level failures: no HTTP response was produced.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// The caller's cancellation token fired before the response arrived.
    #[error("request cancelled")]
    Cancelled,
    /// The per-request timeout elapsed.
    #[error("request timed out")]
    TimedOut,
    /// DNS, connect, TLS, or read failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// The seam between adapters and the wire.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Execute a request, observing `cancel` throughout.
    ///
    /// An already-cancelled token must short-circuit before any I/O.
    ///
    /// # Errors
    /// [`HttpError`] when no HTTP response was produced; HTTP error statuses
    /// are returned as responses, not errors.
    async fn execute(
        &self,
        cancel: &CancellationToken,
        request: HttpRequest,
    ) -> Result<HttpResponse, HttpError>;
}

/// Production transport backed by a pooled `reqwest::Client`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with the workspace pool settings and the given
    /// per-request timeout.
    ///
    /// # Errors
    /// [`HttpError::Transport`] if the client cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .build()
            .map_err(|e| HttpError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing client (shared pools, custom TLS, proxies).
    #[must_use]
    pub const fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(
        &self,
        cancel: &CancellationToken,
        request: HttpRequest,
    ) -> Result<HttpResponse, HttpError> {
        if cancel.is_cancelled() {
            return Err(HttpError::Cancelled);
        }
        let mut builder = self.client.get(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        let round_trip = async {
            let response = builder.send().await?;
            let status = response.status().as_u16();
            // text() drains the body; the connection goes back to the pool
            // on error statuses too.
            let body = response.text().await?;
            Ok::<_, reqwest::Error>(HttpResponse { status, body })
        };
        tokio::select! {
            () = cancel.cancelled() => Err(HttpError::Cancelled),
            result = round_trip => result.map_err(|e| {
                if e.is_timeout() {
                    HttpError::TimedOut
                } else {
                    HttpError::Transport(e.to_string())
                }
            }),
        }
    }
}
