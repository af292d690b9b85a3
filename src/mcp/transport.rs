// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! JSON-RPC 2.0 transport over HTTP.
//!
//! Every exchange is a POST of one envelope to a server's base endpoint.
//! Transient network failures (connect errors, timeouts) are retried with
//! exponential backoff up to a configured bound; HTTP error statuses and
//! malformed payloads are answers and surface immediately. Streamable-HTTP
//! servers may frame the response as a single SSE event, so the body parser
//! accepts both plain JSON and `data:`-framed JSON.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::McpError;
use super::session::{ServerSession, MCP_SESSION_HEADER};

/// JSON-RPC protocol version stamped on every envelope.
const JSONRPC_VERSION: &str = "2.0";

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Retry Policy
// ============================================================================

/// Bounded retry policy for transient network failures.
///
/// The delay after attempt `n` is `base_delay * 2^(n-1)`, capped at
/// `max_delay`, so consecutive delays strictly increase until the cap.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each retry after that.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff delay after the given 1-based attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay)
    }
}

// ============================================================================
// Transport
// ============================================================================

/// A successful JSON-RPC exchange.
#[derive(Debug)]
pub struct RpcResponse {
    /// The envelope's `result` member (null if absent).
    pub result: Value,
    /// Session identifier the server attached to the response, if any.
    pub session_id: Option<String>,
}

/// HTTP transport speaking JSON-RPC 2.0 to MCP servers.
///
/// Cheap to clone; the underlying [`Client`] shares its connection pool.
#[derive(Clone)]
pub struct Transport {
    http: Client,
    retry: RetryPolicy,
}

impl Transport {
    /// Create a transport with the given retry policy and request timeout.
    pub fn new(retry: RetryPolicy, timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");
        Self { http, retry }
    }

    /// Create a transport with the default policy and timeout.
    pub fn with_defaults() -> Self {
        Self::new(
            RetryPolicy::default(),
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    /// Send a request envelope and parse the response.
    ///
    /// The session's current headers ride along on the call; any session
    /// identifier in the response headers is returned for the session
    /// manager to merge.
    pub async fn request(
        &self,
        session: &ServerSession,
        method: &str,
        params: Value,
    ) -> Result<RpcResponse, McpError> {
        let envelope = json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": Uuid::new_v4().to_string(),
            "method": method,
            "params": params,
        });

        debug!(url = %session.endpoint(), method, "Sending JSON-RPC request");
        let response = self.post_with_retry(session, &envelope).await?;
        let url = session.endpoint().clone();

        let session_id = response
            .headers()
            .get(MCP_SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(String::from);
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .text()
            .await
            .map_err(|e| McpError::invalid_envelope(url.as_str(), e.to_string()))?;

        let envelope = parse_envelope(&url, &content_type, &body)?;
        let result = extract_result(envelope)?;
        Ok(RpcResponse { result, session_id })
    }

    /// Send a notification (an id-less envelope; no response body expected).
    pub async fn notify(&self, session: &ServerSession, method: &str) -> Result<(), McpError> {
        let envelope = json!({
            "jsonrpc": JSONRPC_VERSION,
            "method": method,
        });

        debug!(url = %session.endpoint(), method, "Sending JSON-RPC notification");
        self.post_with_retry(session, &envelope).await?;
        Ok(())
    }

    /// POST one envelope, retrying transient failures per the policy.
    async fn post_with_retry(
        &self,
        session: &ServerSession,
        envelope: &Value,
    ) -> Result<reqwest::Response, McpError> {
        let url = session.endpoint().clone();
        let mut attempt = 1u32;

        loop {
            let outcome = self
                .http
                .post(url.clone())
                .headers(session.headers().clone())
                .json(envelope)
                .send()
                .await;

            match outcome {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        return Err(McpError::Status {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                    }
                    return Ok(response);
                }
                Err(err) => {
                    let mapped = classify_send_error(&url, &err);
                    if !mapped.is_transient() || attempt >= self.retry.max_attempts {
                        return Err(mapped);
                    }
                    let delay = self.retry.delay(attempt);
                    warn!(
                        url = %url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %mapped,
                        "Transient transport error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Map a reqwest send error onto the MCP taxonomy.
fn classify_send_error(url: &Url, err: &reqwest::Error) -> McpError {
    if err.is_timeout() {
        McpError::timeout(url.as_str())
    } else if err.is_connect() {
        McpError::connect(url.as_str(), err.to_string())
    } else {
        McpError::http(url.as_str(), err.to_string())
    }
}

/// Parse a response body into a JSON-RPC envelope.
///
/// Accepts plain JSON or a single SSE-framed event.
fn parse_envelope(url: &Url, content_type: &str, body: &str) -> Result<Value, McpError> {
    let payload = if content_type.starts_with("text/event-stream") {
        sse_data(body).ok_or_else(|| {
            McpError::invalid_envelope(url.as_str(), "event stream carried no data payload")
        })?
    } else {
        body
    };
    serde_json::from_str(payload).map_err(|e| McpError::invalid_envelope(url.as_str(), e.to_string()))
}

/// First `data:` payload of an SSE-framed body.
fn sse_data(body: &str) -> Option<&str> {
    body.lines()
        .find_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
}

/// Surface an envelope `error` member; otherwise hand back `result`.
fn extract_result(envelope: Value) -> Result<Value, McpError> {
    if let Some(error) = envelope.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(-32603);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(McpError::rpc(code, message));
    }
    Ok(envelope.get("result").cloned().unwrap_or(Value::Null))
}

/// Extract the conventional text payload from a `tools/call` result.
///
/// Falls back to the serialized result when the content shape is absent.
pub fn text_content(result: &Value) -> String {
    result
        .get("content")
        .and_then(|content| content.get(0))
        .and_then(|first| first.get("text"))
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| result.to_string())
}

/// Whether a `tools/call` result flags itself as an error.
pub fn is_error_result(result: &Value) -> bool {
    result
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}
