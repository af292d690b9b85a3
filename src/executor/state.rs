// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Agent-loop state types.
//!
//! The loop is an explicit state machine: a [`Phase`] enum plus the pure
//! [`advance`] transition function, threaded over one mutable
//! [`ExecutionState`]. Keeping transitions free of I/O makes the branch
//! logic directly unit-testable.

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Serialize;

use crate::mcp::registry::ToolRegistry;
use crate::types::{Decision, Message};

// ============================================================================
// Phases
// ============================================================================

/// Phases of one agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Handshake servers and discover tools.
    Initialize,
    /// Ask the model for the next action.
    GetArguments,
    /// Execute the chosen tool, if any.
    ExecuteTool,
    /// Decide whether the run is finished.
    Validate,
    /// Terminal: the model signaled completion and no errors accumulated.
    Finalize,
    /// Terminal: errors accumulated.
    HandleErrors,
}

impl Phase {
    /// Whether the run stops in this phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalize | Self::HandleErrors)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Initialize => "initialize",
            Self::GetArguments => "get_arguments",
            Self::ExecuteTool => "execute_tool",
            Self::Validate => "validate",
            Self::Finalize => "finalize",
            Self::HandleErrors => "handle_errors",
        };
        write!(f, "{name}")
    }
}

/// Pure transition function for the agent loop.
///
/// Only `Validate` branches: a finished run with errors goes to the error
/// terminal, a finished run without errors to the success terminal, and an
/// unfinished run back to the model for another round. Terminal phases
/// absorb.
pub fn advance(phase: Phase, state: &ExecutionState) -> Phase {
    match phase {
        Phase::Initialize => Phase::GetArguments,
        Phase::GetArguments => Phase::ExecuteTool,
        Phase::ExecuteTool => Phase::Validate,
        Phase::Validate => {
            if state.done {
                if !state.errors.is_empty() {
                    Phase::HandleErrors
                } else {
                    Phase::Finalize
                }
            } else {
                Phase::GetArguments
            }
        }
        terminal => terminal,
    }
}

// ============================================================================
// Error Records
// ============================================================================

/// One recorded failure, tagged with the phase that caught it.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub phase: Phase,
    /// Server endpoint the failure is tied to, when there is one.
    pub server: Option<String>,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl ErrorRecord {
    /// Record a failure not tied to a particular server.
    pub fn new(phase: Phase, message: impl Into<String>) -> Self {
        Self {
            phase,
            server: None,
            message: message.into(),
            at: Utc::now(),
        }
    }

    /// Record a failure tied to one server.
    pub fn for_server(phase: Phase, server: &Url, message: impl Into<String>) -> Self {
        Self {
            phase,
            server: Some(server.to_string()),
            message: message.into(),
            at: Utc::now(),
        }
    }
}

impl std::fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.server {
            Some(server) => write!(f, "[{}] {}: {}", self.phase, server, self.message),
            None => write!(f, "[{}] {}", self.phase, self.message),
        }
    }
}

// ============================================================================
// Execution State
// ============================================================================

/// Configuration for the agent loop.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// MCP server endpoints to handshake and discover tools from.
    pub servers: Vec<Url>,
    /// Hard cap on model rounds, so a model that never signals completion
    /// cannot spin forever.
    pub max_rounds: u32,
    /// Override for the built-in system prompt.
    pub system_prompt: Option<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            max_rounds: 20,
            system_prompt: None,
        }
    }
}

/// The single mutable record threaded through one run.
///
/// Owned exclusively by that run; concurrent runs each get their own.
#[derive(Debug)]
pub struct ExecutionState {
    /// Configured server endpoints, fixed for the run.
    pub servers: Vec<Url>,
    /// Discovered tools; read-only after the initialize phase.
    pub tools: ToolRegistry,
    /// Conversation history, append-only.
    pub messages: Vec<Message>,
    /// Most recent parsed model action.
    pub decision: Option<Decision>,
    /// Accumulated tool results, append-only.
    pub context: Vec<String>,
    /// Accumulated failures, append-only.
    pub errors: Vec<ErrorRecord>,
    /// Completed model rounds.
    pub rounds: u32,
    /// Terminal-decision flag, recomputed each validate phase.
    pub done: bool,
}

impl ExecutionState {
    /// Fresh state for one task.
    pub fn new(servers: Vec<Url>, task: &str) -> Self {
        Self {
            servers,
            tools: ToolRegistry::new(),
            messages: vec![Message::user(task)],
            decision: None,
            context: Vec::new(),
            errors: Vec::new(),
            rounds: 0,
            done: false,
        }
    }

    /// Append a failure record.
    pub fn record_error(&mut self, record: ErrorRecord) {
        self.errors.push(record);
    }

    /// Validate-phase decision.
    ///
    /// The run is finished when the model signaled completion, when any
    /// error is on the books, or when the round cap is reached. Hitting
    /// the cap records an error so it is never mistaken for success.
    pub fn decide_done(&mut self, max_rounds: u32) {
        let completed = self.decision.as_ref().is_some_and(Decision::is_completed);
        if !completed && self.errors.is_empty() && self.rounds >= max_rounds {
            self.record_error(ErrorRecord::new(
                Phase::Validate,
                format!("round cap of {max_rounds} reached without completion"),
            ));
        }
        self.done = completed || !self.errors.is_empty();
    }
}

// ============================================================================
// Run Report
// ============================================================================

/// Terminal outcome of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// True when the run ended in the success terminal.
    pub completed: bool,
    /// Model rounds consumed.
    pub rounds: u32,
    /// Tool results accumulated in order.
    pub context: Vec<String>,
    /// Failures accumulated in order.
    pub errors: Vec<ErrorRecord>,
    /// Names of the tools discovered during initialization.
    pub tools: Vec<String>,
}

impl RunReport {
    pub(crate) fn from_state(state: ExecutionState, completed: bool) -> Self {
        Self {
            completed,
            rounds: state.rounds,
            context: state.context,
            errors: state.errors,
            tools: state
                .tools
                .descriptors()
                .iter()
                .map(|tool| tool.name.clone())
                .collect(),
        }
    }
}
