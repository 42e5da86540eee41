//! # Sovereign HTTP Client
//!
//! Wrapper around the Sovereign REST API.
//!
//! Reads never fail from the caller's point of view: [`SovereignClient::stats_or_fallback`]
//! and [`SovereignClient::increment_or_fallback`] log the error and return a
//! fixed count. Contact submissions surface every error.

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Count shown when the stats request fails.
pub const STATS_FALLBACK: u64 = 542;

/// Count reported when the increment request fails.
pub const INCREMENT_FALLBACK: u64 = 543;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from the HTTP client layer.
#[derive(Debug)]
pub enum ClientError {
    /// Cannot reach the Sovereign server.
    ConnectionFailed(String),
    /// The request did not complete in time.
    Timeout,
    /// 401 Unauthorized - invalid or missing API key.
    Unauthorized,
    /// 429 Too Many Requests.
    RateLimited,
    /// Server returned a 5xx error.
    ServerError(u16, String),
    /// Server rejected the request (4xx other than 401/429).
    BadRequest(u16, String),
    /// Failed to parse response body.
    ParseError(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionFailed(url) => write!(f, "Cannot connect to Sovereign at {url}"),
            Self::Timeout => write!(f, "Request timed out"),
            Self::Unauthorized => write!(f, "Unauthorized: invalid or missing API key"),
            Self::RateLimited => write!(f, "Rate limited: too many requests"),
            Self::ServerError(status, msg) => write!(f, "Server error ({status}): {msg}"),
            Self::BadRequest(status, msg) => write!(f, "Rejected ({status}): {msg}"),
            Self::ParseError(msg) => write!(f, "Parse error: {msg}"),
        }
    }
}

impl std::error::Error for ClientError {}

/// `{count}` or `{error}`.
#[derive(Debug, Deserialize)]
struct CountBody {
    count: Option<u64>,
}

/// `{success, id}` or `{success: false, error}`.
#[derive(Debug, Deserialize)]
struct ContactBody {
    success: bool,
    id: Option<String>,
    error: Option<String>,
}

/// Pull a human-readable message out of an error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

/// HTTP client for the Sovereign REST API.
#[derive(Debug, Clone)]
pub struct SovereignClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl SovereignClient {
    /// Create a client for `base_url` (any route prefix included).
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::ConnectionFailed(format!("client setup: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    /// The server URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a request with optional Bearer auth.
    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.request(method, &url);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    /// Send a request and classify transport errors.
    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, ClientError> {
        req.send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout
            } else {
                ClientError::ConnectionFailed(format!("{}: {e}", self.base_url))
            }
        })
    }

    /// Check status codes and parse the JSON body.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ClientError::RateLimited);
        }
        if status.is_server_error() || status.is_client_error() {
            let body = resp.text().await.unwrap_or_default();
            let msg = error_message(&body);
            return Err(if status.is_server_error() {
                ClientError::ServerError(status.as_u16(), msg)
            } else {
                ClientError::BadRequest(status.as_u16(), msg)
            });
        }
        resp.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout
            } else {
                ClientError::ParseError(e.to_string())
            }
        })
    }

    /// GET /health
    pub async fn health(&self) -> Result<Value, ClientError> {
        let req = self.request(reqwest::Method::GET, "/health");
        let resp = self.send(req).await?;
        self.handle_response(resp).await
    }

    /// GET /sovereign/stats → current member count.
    pub async fn stats(&self) -> Result<u64, ClientError> {
        let req = self.request(reqwest::Method::GET, "/sovereign/stats");
        let resp = self.send(req).await?;
        let body: CountBody = self.handle_response(resp).await?;
        body.count
            .ok_or_else(|| ClientError::ParseError("response has no count".to_string()))
    }

    /// POST /sovereign/increment → count after adding one member.
    pub async fn increment(&self) -> Result<u64, ClientError> {
        let req = self.request(reqwest::Method::POST, "/sovereign/increment");
        let resp = self.send(req).await?;
        let body: CountBody = self.handle_response(resp).await?;
        body.count
            .ok_or_else(|| ClientError::ParseError("response has no count".to_string()))
    }

    /// POST /sovereign/contact → id of the stored record.
    pub async fn submit_contact(&self, payload: &Value) -> Result<String, ClientError> {
        let req = self
            .request(reqwest::Method::POST, "/sovereign/contact")
            .json(payload);
        let resp = self.send(req).await?;
        let body: ContactBody = self.handle_response(resp).await?;
        match (body.success, body.id) {
            (true, Some(id)) => Ok(id),
            _ => Err(ClientError::BadRequest(
                200,
                body.error
                    .unwrap_or_else(|| "submission not accepted".to_string()),
            )),
        }
    }

    /// [`SovereignClient::stats`], or [`STATS_FALLBACK`] on any failure.
    pub async fn stats_or_fallback(&self) -> u64 {
        match self.stats().await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "Stats unavailable, showing fallback count");
                STATS_FALLBACK
            }
        }
    }

    /// [`SovereignClient::increment`], or [`INCREMENT_FALLBACK`] on any failure.
    pub async fn increment_or_fallback(&self) -> u64 {
        match self.increment().await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "Increment failed, showing fallback count");
                INCREMENT_FALLBACK
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
