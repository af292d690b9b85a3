// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Model Context Protocol (MCP) client plumbing.
//!
//! This module implements the protocol side of tool execution: a retrying
//! JSON-RPC transport, per-server session handshakes, tool discovery and
//! resolution, and argument normalization. The agent loop in
//! [`crate::executor`] sequences these pieces.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     SessionManager                       │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐    │
//! │  │ServerSession │  │ServerSession │  │ServerSession │    │
//! │  │  (server1)   │  │  (server2)   │  │  (server3)   │    │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘    │
//! └─────────┼─────────────────┼─────────────────┼────────────┘
//!           │                 │                 │
//!           └────────────┐    │    ┌────────────┘
//!                   ┌────▼────▼────▼────┐
//!                   │     Transport     │
//!                   │ (JSON-RPC / HTTP, │
//!                   │  bounded retries) │
//!                   └───────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use toolflow::mcp::{SessionManager, ToolRegistry, Transport};
//!
//! let transport = Transport::with_defaults();
//! let mut sessions = SessionManager::new(transport.clone());
//!
//! // Handshake every configured server; failures are per-server.
//! sessions.handshake_all(&servers).await;
//!
//! // Aggregate tool descriptors across ready servers.
//! let discovery = ToolRegistry::discover(&transport, &sessions).await;
//!
//! // Resolve and dispatch.
//! let tool = discovery.registry.resolve("getPrice")?;
//! let session = sessions.session(&tool.server)?;
//! let response = transport
//!     .request(session, "tools/call", params)
//!     .await?;
//! ```

pub mod error;
pub mod normalize;
pub mod registry;
pub mod session;
pub mod transport;

pub use error::McpError;
pub use normalize::{normalize_arguments, normalize_map};
pub use registry::{DiscoveryOutcome, ToolDescriptor, ToolRegistry};
pub use session::{ServerSession, SessionManager, MCP_SESSION_HEADER, PROTOCOL_VERSION};
pub use transport::{is_error_result, text_content, RetryPolicy, RpcResponse, Transport};
