// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Per-server session state and the protocol handshake.
//!
//! A server becomes usable only after its handshake: a liveness ping, the
//! `initialize` exchange, capture of the server-assigned session header,
//! and the `notifications/initialized` acknowledgment. Handshakes for
//! distinct servers run concurrently; a failure is scoped to its server.

use std::collections::HashMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Url;
use serde_json::json;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::error::McpError;
use super::transport::Transport;

/// MCP protocol revision spoken by this client.
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Header carrying the server-assigned session identifier.
pub const MCP_SESSION_HEADER: &str = "mcp-session-id";

/// Request header naming the protocol revision.
const PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

// ============================================================================
// ServerSession
// ============================================================================

/// Session state for one MCP server.
///
/// Holds the endpoint plus the header set every call to that server must
/// carry. Mutated only during the handshake; read-only afterward.
#[derive(Debug, Clone)]
pub struct ServerSession {
    endpoint: Url,
    headers: HeaderMap,
    handshake_complete: bool,
}

impl ServerSession {
    /// Create a fresh session with the base header set.
    pub fn new(endpoint: Url) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/event-stream"),
        );
        headers.insert(
            HeaderName::from_static(PROTOCOL_VERSION_HEADER),
            HeaderValue::from_static(PROTOCOL_VERSION),
        );
        Self {
            endpoint,
            headers,
            handshake_complete: false,
        }
    }

    /// The server's base endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Headers to attach to every call to this server.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Whether the handshake completed for this server.
    pub fn is_ready(&self) -> bool {
        self.handshake_complete
    }

    /// Merge the server-assigned session identifier into the header set.
    fn set_session_id(&mut self, token: &str) -> Result<(), McpError> {
        let value = HeaderValue::from_str(token).map_err(|e| {
            McpError::handshake(
                self.endpoint.as_str(),
                format!("invalid session id header: {e}"),
            )
        })?;
        self.headers
            .insert(HeaderName::from_static(MCP_SESSION_HEADER), value);
        Ok(())
    }

    fn mark_ready(&mut self) {
        self.handshake_complete = true;
    }
}

// ============================================================================
// SessionManager
// ============================================================================

/// Run-scoped collection of server sessions.
///
/// The session map is fully built by [`SessionManager::handshake_all`]
/// before any caller can observe it, so later reads need no locking.
pub struct SessionManager {
    transport: Transport,
    sessions: HashMap<Url, ServerSession>,
    /// Configured endpoint order, for deterministic iteration.
    order: Vec<Url>,
}

impl SessionManager {
    /// Create an empty manager over the given transport.
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            sessions: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Handshake every endpoint concurrently.
    ///
    /// Returns one outcome per endpoint in input order. A failed endpoint
    /// holds no session afterward; a successful one is dispatchable.
    pub async fn handshake_all(&mut self, servers: &[Url]) -> Vec<(Url, Result<(), McpError>)> {
        let mut join_set = JoinSet::new();
        for (index, endpoint) in servers.iter().cloned().enumerate() {
            let transport = self.transport.clone();
            join_set.spawn(async move {
                let outcome = handshake(&transport, endpoint.clone()).await;
                (index, endpoint, outcome)
            });
        }

        let mut slots: Vec<Option<(Url, Result<ServerSession, McpError>)>> =
            servers.iter().map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, endpoint, outcome)) => slots[index] = Some((endpoint, outcome)),
                Err(join_err) => warn!(error = %join_err, "Handshake task failed to join"),
            }
        }
        for (index, slot) in slots.iter_mut().enumerate() {
            if slot.is_none() {
                let endpoint = servers[index].clone();
                let err = McpError::handshake(endpoint.as_str(), "handshake task aborted");
                *slot = Some((endpoint, Err(err)));
            }
        }

        let mut outcomes = Vec::with_capacity(servers.len());
        for (endpoint, outcome) in slots.into_iter().flatten() {
            match outcome {
                Ok(session) => {
                    info!(url = %endpoint, "MCP handshake complete");
                    self.order.push(endpoint.clone());
                    self.sessions.insert(endpoint.clone(), session);
                    outcomes.push((endpoint, Ok(())));
                }
                Err(err) => {
                    warn!(url = %endpoint, error = %err, "MCP handshake failed");
                    outcomes.push((endpoint, Err(err)));
                }
            }
        }
        outcomes
    }

    /// Session for one endpoint, only if its handshake completed.
    pub fn session(&self, endpoint: &Url) -> Result<&ServerSession, McpError> {
        self.sessions
            .get(endpoint)
            .filter(|session| session.is_ready())
            .ok_or_else(|| McpError::NotReady(endpoint.to_string()))
    }

    /// Ready sessions in configured order.
    pub fn ready_sessions(&self) -> impl Iterator<Item = &ServerSession> {
        self.order
            .iter()
            .filter_map(|endpoint| self.sessions.get(endpoint))
            .filter(|session| session.is_ready())
    }

    /// Number of servers with a completed handshake.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no server completed its handshake.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Perform the handshake steps against one endpoint.
async fn handshake(transport: &Transport, endpoint: Url) -> Result<ServerSession, McpError> {
    let mut session = ServerSession::new(endpoint.clone());

    transport
        .request(&session, "ping", json!({}))
        .await
        .map_err(|e| McpError::handshake(endpoint.as_str(), format!("ping failed: {e}")))?;

    let initialize = transport
        .request(
            &session,
            "initialize",
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
        )
        .await
        .map_err(|e| McpError::handshake(endpoint.as_str(), format!("initialize failed: {e}")))?;

    if let Some(token) = initialize.session_id.as_deref() {
        session.set_session_id(token)?;
        debug!(url = %endpoint, "Captured session identifier");
    }

    transport
        .notify(&session, "notifications/initialized")
        .await
        .map_err(|e| {
            McpError::handshake(
                endpoint.as_str(),
                format!("initialized notification failed: {e}"),
            )
        })?;

    session.mark_ready();
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Url {
        Url::parse("http://localhost:8080/mcp").unwrap()
    }

    #[test]
    fn test_new_session_base_headers() {
        let session = ServerSession::new(endpoint());
        assert!(!session.is_ready());
        assert_eq!(
            session.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(
            session.headers().get(ACCEPT).unwrap(),
            "application/json, text/event-stream"
        );
        assert_eq!(
            session.headers().get(PROTOCOL_VERSION_HEADER).unwrap(),
            PROTOCOL_VERSION
        );
        assert!(session.headers().get(MCP_SESSION_HEADER).is_none());
    }

    #[test]
    fn test_session_id_merged_into_headers() {
        let mut session = ServerSession::new(endpoint());
        session.set_session_id("abc-123").unwrap();
        assert_eq!(session.headers().get(MCP_SESSION_HEADER).unwrap(), "abc-123");

        // A rotated identifier replaces the previous one.
        session.set_session_id("def-456").unwrap();
        assert_eq!(session.headers().get(MCP_SESSION_HEADER).unwrap(), "def-456");
    }

    #[test]
    fn test_invalid_session_id_rejected() {
        let mut session = ServerSession::new(endpoint());
        let err = session.set_session_id("bad\nvalue").unwrap_err();
        assert!(matches!(err, McpError::Handshake { .. }));
    }

    #[test]
    fn test_mark_ready() {
        let mut session = ServerSession::new(endpoint());
        session.mark_ready();
        assert!(session.is_ready());
    }

    #[test]
    fn test_unknown_endpoint_is_not_ready() {
        let manager = SessionManager::new(Transport::with_defaults());
        let err = manager.session(&endpoint()).unwrap_err();
        assert!(matches!(err, McpError::NotReady(_)));
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }
}
