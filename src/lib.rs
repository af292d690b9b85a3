// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Toolflow - an LLM tool-calling engine over MCP-style servers.
//!
//! Toolflow hands a task to a model, lets the model pick from tools
//! advertised by Model Context Protocol servers, executes the calls over a
//! retrying JSON-RPC transport, and loops until the model says the task is
//! done. Failures never escape the loop; they end the run as structured
//! error records.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`types`] - Core type definitions (Message, Decision, the LlmClient trait)
//! - [`error`] - Error types and result aliases
//! - [`config`] - Settings resolution from files and the environment
//! - [`llm`] - LLM client implementations (Gemini)
//! - [`mcp`] - Protocol plumbing: transport, sessions, tool registry, normalization
//! - [`executor`] - The agent loop state machine
//! - [`telemetry`] - Tracing initialization
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use toolflow::executor::{Executor, ExecutorConfig};
//! use toolflow::llm::GeminiClient;
//! use toolflow::mcp::Transport;
//!
//! let llm = Arc::new(GeminiClient::new(api_key, "gemini-2.5-flash"));
//! let executor = Executor::new(
//!     llm,
//!     Transport::with_defaults(),
//!     ExecutorConfig {
//!         servers: vec!["http://localhost:8080/mcp".parse()?],
//!         ..Default::default()
//!     },
//! );
//!
//! let report = executor.run("What did AAPL close at today?").await;
//! println!("completed: {}", report.completed);
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod llm;
pub mod mcp;
pub mod telemetry;
pub mod types;

// Re-export commonly used types at crate root
pub use config::Settings;
pub use error::{ConfigError, LlmError, Result};
pub use executor::{Executor, ExecutorConfig, Phase, RunReport};
pub use llm::{create_client, gemini, GeminiClient};
pub use mcp::{McpError, SessionManager, ToolDescriptor, ToolRegistry, Transport};
pub use types::{BoxedLlm, Decision, LlmClient, Message, Role, SharedLlm};

/// Toolflow version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_public_exports() {
        // Verify key types are accessible
        let _msg = Message::user("test");
        let _settings = Settings::new();
        let _registry = ToolRegistry::new();
    }
}
