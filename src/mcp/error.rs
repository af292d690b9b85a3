// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! MCP error types.
//!
//! The split that matters here is transient versus terminal: connect
//! failures and timeouts may be retried by the transport, everything else
//! surfaces immediately.

use thiserror::Error;

/// Errors that can occur during MCP operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// Connection could not be established.
    #[error("Failed to connect to MCP server '{url}': {message}")]
    Connect { url: String, message: String },

    /// Request timed out.
    #[error("Request to MCP server '{url}' timed out")]
    Timeout { url: String },

    /// Server answered with a non-success HTTP status.
    #[error("MCP server '{url}' returned HTTP status {status}")]
    Status { url: String, status: u16 },

    /// Request failed for a reason other than connect/timeout.
    #[error("HTTP error for '{url}': {message}")]
    Http { url: String, message: String },

    /// Response body was not a valid JSON-RPC envelope.
    #[error("Invalid response from MCP server '{url}': {message}")]
    InvalidEnvelope { url: String, message: String },

    /// Server answered with a JSON-RPC error object.
    #[error("Protocol error: code={code}, message={message}")]
    Rpc { code: i64, message: String },

    /// A handshake step failed for a server.
    #[error("Handshake with MCP server '{url}' failed: {message}")]
    Handshake { url: String, message: String },

    /// Tool name not present in the registry.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Dispatch attempted against a server whose handshake is incomplete.
    #[error("MCP server '{0}' is not ready")]
    NotReady(String),

    /// Client-side configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    /// Create a connect error.
    pub fn connect(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connect {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Create a non-retryable HTTP error.
    pub fn http(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Http {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-envelope error.
    pub fn invalid_envelope(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvelope {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a handshake error.
    pub fn handshake(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handshake {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a protocol error from a JSON-RPC error object.
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
        }
    }

    /// Whether the transport may retry after this error.
    ///
    /// Only network-level failures qualify; HTTP status and protocol
    /// errors are answers, not outages.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = McpError::connect("http://localhost:9", "connection refused");
        assert!(err.to_string().contains("http://localhost:9"));
        assert!(err.to_string().contains("connection refused"));

        let err = McpError::rpc(-32600, "Invalid Request");
        assert!(err.to_string().contains("-32600"));
        assert!(err.to_string().contains("Invalid Request"));

        let err = McpError::ToolNotFound("getQuote".to_string());
        assert!(err.to_string().contains("getQuote"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(McpError::connect("u", "refused").is_transient());
        assert!(McpError::timeout("u").is_transient());

        assert!(!McpError::Status {
            url: "u".to_string(),
            status: 500
        }
        .is_transient());
        assert!(!McpError::Status {
            url: "u".to_string(),
            status: 404
        }
        .is_transient());
        assert!(!McpError::invalid_envelope("u", "not json").is_transient());
        assert!(!McpError::rpc(-32601, "method not found").is_transient());
        assert!(!McpError::handshake("u", "ping failed").is_transient());
        assert!(!McpError::http("u", "redirect loop").is_transient());
    }
}
