// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Agent loop executor.
//!
//! The executor drives one task through an explicit state machine: servers
//! are handshaked and their tools discovered, then the model is asked for
//! an action, the action is executed, and the outcome validated, until the
//! model signals completion or errors force the failure terminal.
//!
//! ```text
//!              ┌───────────────────────────────┐
//!              ▼                               │
//! Initialize ──► GetArguments ──► ExecuteTool ──► Validate ──► Finalize
//!                                                    │
//!                                                    └──► HandleErrors
//! ```
//!
//! No failure escapes [`Executor::run`]: every fault becomes either an
//! error record driving the run to `HandleErrors`, or a corrective message
//! the next model round can react to.
//!
//! # Example
//!
//! ```rust,ignore
//! use toolflow::executor::{Executor, ExecutorConfig};
//! use toolflow::mcp::Transport;
//! use std::sync::Arc;
//!
//! let executor = Executor::new(
//!     Arc::new(llm),
//!     Transport::with_defaults(),
//!     ExecutorConfig {
//!         servers: vec!["http://localhost:8080/mcp".parse()?],
//!         ..Default::default()
//!     },
//! );
//!
//! let report = executor.run("What did AAPL close at today?").await;
//! for line in &report.context {
//!     println!("{line}");
//! }
//! ```

mod state;

pub use state::{
    advance, ErrorRecord, ExecutionState, ExecutorConfig, Phase, RunReport,
};

use std::sync::Arc;

use reqwest::Url;
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::mcp::{
    is_error_result, normalize_map, text_content, ServerSession, SessionManager, ToolRegistry,
    Transport,
};
use crate::types::{Decision, LlmClient, Message};

/// System instruction given to the model each round.
const SYSTEM_PROMPT: &str = "You are a tool-calling agent. You are given a task and a set of callable tools.\n\
Each turn, reply with exactly one JSON object and nothing else.\n\
To call a tool: {\"tool\": \"<name>\", \"args\": {\"<param>\": \"<value>\"}}.\n\
Once the gathered context fully answers the task: {\"completed\": true}.";

/// Health of one configured endpoint, from [`Executor::ping`].
#[derive(Debug)]
pub struct ServerHealth {
    pub endpoint: Url,
    pub reachable: bool,
    /// Failure detail when unreachable.
    pub detail: Option<String>,
}

/// Drives the agent loop against a set of MCP servers.
///
/// The executor itself is reusable; every run gets its own
/// [`ExecutionState`] and its own run-scoped [`SessionManager`], so
/// concurrent runs never share session headers.
pub struct Executor {
    llm: Arc<dyn LlmClient>,
    transport: Transport,
    config: ExecutorConfig,
}

impl Executor {
    /// Create an executor.
    pub fn new(llm: Arc<dyn LlmClient>, transport: Transport, config: ExecutorConfig) -> Self {
        Self {
            llm,
            transport,
            config,
        }
    }

    /// The configured loop settings.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run one task to a terminal phase.
    pub async fn run(&self, task: &str) -> RunReport {
        self.run_internal(task, None).await
    }

    /// Run one task with a cancellation signal.
    ///
    /// When `cancel_rx` flips to `true`, any in-flight call is dropped
    /// (skipping remaining retries), a cancellation error is recorded, and
    /// the run ends in the failure terminal.
    pub async fn run_with_cancel(
        &self,
        task: &str,
        cancel_rx: watch::Receiver<bool>,
    ) -> RunReport {
        self.run_internal(task, Some(cancel_rx)).await
    }

    async fn run_internal(
        &self,
        task: &str,
        cancel_rx: Option<watch::Receiver<bool>>,
    ) -> RunReport {
        let mut cancel_rx = cancel_rx;
        let mut state = ExecutionState::new(self.config.servers.clone(), task);
        let mut sessions = SessionManager::new(self.transport.clone());
        let mut phase = Phase::Initialize;

        loop {
            if let Some(rx) = cancel_rx.as_ref() {
                if *rx.borrow() {
                    warn!(phase = %phase, "Run cancelled");
                    state.record_error(ErrorRecord::new(phase, "run cancelled"));
                    phase = Phase::HandleErrors;
                }
            }
            if phase.is_terminal() {
                break;
            }

            let mut sender_gone = false;
            let stepped = if let Some(rx) = cancel_rx.as_mut() {
                tokio::select! {
                    _ = self.step(phase, &mut state, &mut sessions) => true,
                    changed = rx.changed() => {
                        sender_gone = changed.is_err();
                        false
                    }
                }
            } else {
                self.step(phase, &mut state, &mut sessions).await;
                true
            };
            // A dropped sender can never signal; stop selecting against it.
            if sender_gone {
                cancel_rx = None;
            }

            if stepped {
                phase = advance(phase, &state);
            }
            // Otherwise the loop top re-reads the cancellation flag.
        }

        self.finish(phase, state)
    }

    /// Probe the configured endpoints. See [`ping_servers`].
    pub async fn ping(&self) -> Vec<ServerHealth> {
        ping_servers(&self.transport, &self.config.servers).await
    }

    async fn step(&self, phase: Phase, state: &mut ExecutionState, sessions: &mut SessionManager) {
        match phase {
            Phase::Initialize => self.initialize(state, sessions).await,
            Phase::GetArguments => self.get_arguments(state).await,
            Phase::ExecuteTool => self.execute_tool(state, sessions).await,
            Phase::Validate => self.validate(state),
            Phase::Finalize | Phase::HandleErrors => {}
        }
    }

    /// Handshake every configured server, then populate the registry.
    async fn initialize(&self, state: &mut ExecutionState, sessions: &mut SessionManager) {
        let outcomes = sessions.handshake_all(&state.servers).await;
        for (endpoint, outcome) in outcomes {
            if let Err(err) = outcome {
                state.record_error(ErrorRecord::for_server(
                    Phase::Initialize,
                    &endpoint,
                    err.to_string(),
                ));
            }
        }
        info!(
            ready = sessions.len(),
            configured = state.servers.len(),
            "Sessions initialized"
        );

        let discovery = ToolRegistry::discover(&self.transport, sessions).await;
        for (endpoint, err) in discovery.failures {
            state.record_error(ErrorRecord::for_server(
                Phase::Initialize,
                &endpoint,
                err.to_string(),
            ));
        }
        state.tools = discovery.registry;
        info!(tools = state.tools.len(), "Tool registry populated");
    }

    /// Ask the model for the next action and parse its reply.
    async fn get_arguments(&self, state: &mut ExecutionState) {
        state.rounds += 1;
        debug!(round = state.rounds, "Requesting next action from model");

        let reply = match self
            .llm
            .chat(self.system_prompt(), &state.messages, state.tools.descriptors())
            .await
        {
            Ok(reply) => reply,
            Err(err) => {
                error!(error = %err, "Model call failed");
                state.decision = None;
                state.record_error(ErrorRecord::new(
                    Phase::GetArguments,
                    format!("model call failed: {err}"),
                ));
                return;
            }
        };

        state.messages.push(Message::assistant(reply.clone()));

        match Decision::parse(&reply) {
            Ok(decision) => {
                debug!(
                    tool = decision.tool.as_deref().unwrap_or("-"),
                    completed = decision.completed,
                    "Parsed decision"
                );
                state.decision = Some(decision);
            }
            Err(err) => {
                warn!(error = %err, "Model reply did not parse into a decision");
                state.decision = None;
                state.record_error(ErrorRecord::new(
                    Phase::GetArguments,
                    format!("unparseable decision: {err}"),
                ));
            }
        }
    }

    /// Execute the decided tool call, if the decision names one.
    async fn execute_tool(&self, state: &mut ExecutionState, sessions: &SessionManager) {
        let Some(decision) = state.decision.clone() else {
            // Nothing parseable this round; validation will see the record.
            return;
        };
        if decision.is_completed() {
            debug!("Completion signal; nothing to dispatch");
            return;
        }
        let (Some(tool), Some(args)) = (decision.tool, decision.args) else {
            state.record_error(ErrorRecord::new(
                Phase::ExecuteTool,
                "decision missing tool name or arguments",
            ));
            return;
        };

        let args = normalize_map(args);

        let server = match state.tools.resolve(&tool) {
            Ok(descriptor) => descriptor.server.clone(),
            Err(err) => {
                state.record_error(ErrorRecord::new(Phase::ExecuteTool, err.to_string()));
                return;
            }
        };
        let session = match sessions.session(&server) {
            Ok(session) => session,
            Err(err) => {
                state.record_error(ErrorRecord::for_server(
                    Phase::ExecuteTool,
                    &server,
                    err.to_string(),
                ));
                return;
            }
        };

        info!(tool = %tool, server = %server, "Dispatching tool call");
        let params = json!({"name": tool, "arguments": args});
        match self.transport.request(session, "tools/call", params).await {
            Ok(response) => {
                let text = text_content(&response.result);
                if is_error_result(&response.result) {
                    warn!(tool = %tool, "Tool reported an error; feeding back to the model");
                    state.messages.push(Message::user(format!(
                        "The call to '{tool}' failed: {text}. Retry with different arguments."
                    )));
                } else {
                    state.messages.push(Message::user(format!(
                        "New context from '{tool}': {text}"
                    )));
                    state.context.push(text);
                }
            }
            Err(err) => {
                error!(tool = %tool, error = %err, "Tool dispatch failed");
                state.record_error(ErrorRecord::for_server(
                    Phase::ExecuteTool,
                    &server,
                    err.to_string(),
                ));
            }
        }
    }

    /// Decide whether the run is finished.
    fn validate(&self, state: &mut ExecutionState) {
        state.decide_done(self.config.max_rounds);
        debug!(
            done = state.done,
            errors = state.errors.len(),
            rounds = state.rounds,
            "Validated round"
        );
    }

    /// Produce the terminal report.
    fn finish(&self, phase: Phase, state: ExecutionState) -> RunReport {
        let completed = matches!(phase, Phase::Finalize);
        if completed {
            info!(
                rounds = state.rounds,
                context = state.context.len(),
                "Run finalized"
            );
        } else {
            warn!(
                rounds = state.rounds,
                errors = state.errors.len(),
                "Run ended with errors"
            );
        }
        RunReport::from_state(state, completed)
    }

    fn system_prompt(&self) -> &str {
        self.config.system_prompt.as_deref().unwrap_or(SYSTEM_PROMPT)
    }
}

/// Probe each endpoint with a bare liveness ping.
///
/// No handshake is performed; this is a pre-flight health check.
pub async fn ping_servers(transport: &Transport, servers: &[Url]) -> Vec<ServerHealth> {
    let mut healths = Vec::with_capacity(servers.len());
    for endpoint in servers {
        let session = ServerSession::new(endpoint.clone());
        let health = match transport.request(&session, "ping", json!({})).await {
            Ok(_) => ServerHealth {
                endpoint: endpoint.clone(),
                reachable: true,
                detail: None,
            },
            Err(err) => ServerHealth {
                endpoint: endpoint.clone(),
                reachable: false,
                detail: Some(err.to_string()),
            },
        };
        healths.push(health);
    }
    healths
}
