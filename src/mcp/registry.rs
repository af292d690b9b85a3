// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Aggregated tool registry across MCP servers.
//!
//! Discovery walks every handshaked server's `tools/list` and merges the
//! results into one ordered registry. Resolution is exact-name lookup;
//! when two servers advertise the same name, the first registration in
//! configured-server order wins and the shadowing is logged once.

use reqwest::Url;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::error::McpError;
use super::session::SessionManager;
use super::transport::Transport;

/// Metadata for one invocable capability advertised by a server.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// Opaque argument schema, exactly as the server advertised it.
    pub schema: Value,
    /// Endpoint of the owning server.
    pub server: Url,
}

impl ToolDescriptor {
    /// Create a descriptor.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        server: Url,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            server,
        }
    }
}

/// Result of aggregating tool lists across servers.
#[derive(Debug, Default)]
pub struct DiscoveryOutcome {
    pub registry: ToolRegistry,
    /// Servers whose listing failed, with the failure. Never aborts the rest.
    pub failures: Vec<(Url, McpError)>,
}

/// Ordered collection of tool descriptors, immutable after discovery.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from already-known descriptors.
    pub fn from_descriptors(descriptors: Vec<ToolDescriptor>) -> Self {
        let mut registry = Self::new();
        for descriptor in descriptors {
            registry.insert(descriptor);
        }
        registry
    }

    /// Aggregate descriptors from every ready session.
    pub async fn discover(transport: &Transport, sessions: &SessionManager) -> DiscoveryOutcome {
        let mut registry = ToolRegistry::new();
        let mut failures = Vec::new();

        for session in sessions.ready_sessions() {
            match transport.request(session, "tools/list", json!({})).await {
                Ok(response) => {
                    let found = parse_tool_list(session.endpoint(), &response.result);
                    debug!(url = %session.endpoint(), count = found.len(), "Listed tools");
                    for descriptor in found {
                        registry.insert(descriptor);
                    }
                }
                Err(err) => {
                    warn!(url = %session.endpoint(), error = %err, "Tool listing failed");
                    failures.push((session.endpoint().clone(), err));
                }
            }
        }

        DiscoveryOutcome { registry, failures }
    }

    /// Exact-name lookup; first match in registration order wins.
    pub fn resolve(&self, name: &str) -> Result<&ToolDescriptor, McpError> {
        self.lookup(name)
            .ok_or_else(|| McpError::ToolNotFound(name.to_string()))
    }

    /// All descriptors in registration order.
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Number of registered descriptors.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry holds no descriptors.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    fn insert(&mut self, descriptor: ToolDescriptor) {
        if let Some(existing) = self.lookup(&descriptor.name) {
            warn!(
                tool = %descriptor.name,
                first = %existing.server,
                shadowed = %descriptor.server,
                "Duplicate tool name across servers; first registration wins"
            );
        }
        self.tools.push(descriptor);
    }

    fn lookup(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|tool| tool.name == name)
    }
}

/// Parse a `tools/list` result into descriptors owned by `server`.
///
/// Entries without a name are skipped; a missing schema defaults to an
/// empty object schema.
fn parse_tool_list(server: &Url, result: &Value) -> Vec<ToolDescriptor> {
    result
        .get("tools")
        .and_then(Value::as_array)
        .map(|tools| {
            tools
                .iter()
                .filter_map(|tool| {
                    let name = tool.get("name")?.as_str()?.to_string();
                    let description = tool
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    let schema = tool
                        .get("inputSchema")
                        .cloned()
                        .unwrap_or_else(|| json!({"type": "object"}));
                    Some(ToolDescriptor {
                        name,
                        description,
                        schema,
                        server: server.clone(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}
