// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Core types for the toolflow engine.
//!
//! This module defines the conversation primitives shared by the agent loop
//! and the LLM client, plus the [`LlmClient`] trait that abstracts over
//! language-model backends.

use serde::{Deserialize, Serialize};

// ============================================================================
// Message Types
// ============================================================================

/// Role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A message in a conversation.
///
/// The agent loop exchanges plain text with the model; tool invocations are
/// encoded as JSON inside the text rather than as structured content blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

// ============================================================================
// Decisions
// ============================================================================

/// The parsed outcome of one model turn.
///
/// The model replies with a JSON object naming either the next tool to call
/// (`{"tool": ..., "args": {...}}`) or an explicit completion signal
/// (`{"completed": true}`). Fields are optional so that a partially-formed
/// reply can still be inspected and reported instead of rejected outright.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Decision {
    /// Name of the tool the model wants to invoke.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,

    /// Arguments for the tool call, as produced by the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<serde_json::Map<String, serde_json::Value>>,

    /// Whether the model considers the task finished.
    #[serde(default)]
    pub completed: bool,
}

impl Decision {
    /// Parse a raw model reply into a decision.
    ///
    /// Tolerates a Markdown code fence around the JSON body, with or
    /// without a `json` language tag. Anything that does not deserialize
    /// into the decision shape is an error for the caller to surface.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(strip_fences(text))
    }

    /// Whether this decision is an explicit completion signal.
    ///
    /// Completion wins over a simultaneously-present tool name.
    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

/// Strip a surrounding Markdown code fence, if present.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

// ============================================================================
// LLM Client Trait
// ============================================================================

use crate::error::LlmError;
use crate::mcp::registry::ToolDescriptor;
use async_trait::async_trait;

/// Trait that all LLM backends must implement.
///
/// This is the seam between the agent loop and whatever model drives it.
/// Implementations handle the specifics of each backend's API.
///
/// # Example
///
/// ```rust,ignore
/// use toolflow::types::{LlmClient, Message};
///
/// struct MyBackend;
///
/// #[async_trait]
/// impl LlmClient for MyBackend {
///     async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
///         // Implementation...
///     }
///     // ... other methods
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single free-form prompt and return the model's text reply.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// Send a system prompt, conversation history, and the available tool
    /// descriptors; return the model's text reply.
    ///
    /// The reply is expected to parse as a [`Decision`], but that is the
    /// caller's concern; this method only moves text.
    async fn chat(
        &self,
        system_prompt: &str,
        history: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<String, LlmError>;

    /// Identifier of the underlying model, for logs and display.
    fn model(&self) -> &str;
}

/// A boxed LLM client for dynamic dispatch.
pub type BoxedLlm = Box<dyn LlmClient>;

/// Arc-wrapped LLM client for shared ownership.
pub type SharedLlm = std::sync::Arc<dyn LlmClient>;
