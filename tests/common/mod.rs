// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Shared fixtures: an in-process MCP stub server and a scripted model.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use reqwest::Url;
use serde_json::{json, Value};
use uuid::Uuid;

use toolflow::mcp::{RetryPolicy, MCP_SESSION_HEADER, PROTOCOL_VERSION};
use toolflow::{LlmClient, LlmError, Message, ToolDescriptor, Transport};

// ============================================================================
// Stub MCP Server
// ============================================================================

/// How the stub answers incoming POSTs.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Speak the protocol: ping, initialize, tools/list, tools/call.
    Normal,
    /// Accept the request, then hold the connection open past any client
    /// timeout.
    Stall,
    /// Answer every request with HTTP 500.
    Fail500,
    /// Answer 200 with a body that is not JSON.
    Garbage,
}

/// One tool the stub advertises, with its canned `tools/call` result.
#[derive(Debug, Clone)]
pub struct StubTool {
    pub name: String,
    pub description: String,
    pub schema: Value,
    pub reply: String,
    pub is_error: bool,
}

impl StubTool {
    pub fn new(name: &str, description: &str, reply: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            schema: json!({"type": "object"}),
            reply: reply.to_string(),
            is_error: false,
        }
    }

    /// A tool whose result carries the `isError` flag.
    pub fn failing(name: &str, description: &str, reply: &str) -> Self {
        Self {
            is_error: true,
            ..Self::new(name, description, reply)
        }
    }
}

/// One JSON-RPC request the stub received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub params: Value,
    /// Value of the `mcp-session-id` request header, if present.
    pub session: Option<String>,
}

struct StubState {
    behavior: Behavior,
    tools: Vec<StubTool>,
    session_id: String,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

/// An in-process MCP server bound to an ephemeral localhost port.
pub struct StubServer {
    pub url: Url,
    /// Session identifier the stub hands out on `initialize`.
    pub session_id: String,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl StubServer {
    pub async fn spawn(tools: Vec<StubTool>) -> Self {
        Self::spawn_with(Behavior::Normal, tools).await
    }

    pub async fn spawn_with(behavior: Behavior, tools: Vec<StubTool>) -> Self {
        let session_id = format!("sess-{}", Uuid::new_v4());
        let calls = Arc::new(Mutex::new(Vec::new()));
        let state = Arc::new(StubState {
            behavior,
            tools,
            session_id: session_id.clone(),
            calls: Arc::clone(&calls),
        });

        let app = Router::new().route("/mcp", post(handle)).with_state(state);
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0))
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub listener address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve stub");
        });

        let url = Url::parse(&format!("http://{addr}/mcp")).expect("stub url");
        Self {
            url,
            session_id,
            calls,
        }
    }

    /// Every request received so far, in arrival order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Requests for one JSON-RPC method, in arrival order.
    pub fn calls_for(&self, method: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == method)
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

async fn handle(
    State(stub): State<Arc<StubState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let method = body
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let session = headers
        .get(MCP_SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(String::from);
    stub.calls.lock().unwrap().push(RecordedCall {
        method: method.clone(),
        params: body.get("params").cloned().unwrap_or(Value::Null),
        session,
    });

    match stub.behavior {
        Behavior::Fail500 => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "stub configured to fail").into_response();
        }
        Behavior::Garbage => {
            return (StatusCode::OK, "this is not a JSON-RPC envelope").into_response();
        }
        Behavior::Stall => {
            // The client's timeout fires long before this does.
            tokio::time::sleep(Duration::from_secs(600)).await;
            return StatusCode::OK.into_response();
        }
        Behavior::Normal => {}
    }

    // Notifications carry no id and expect no body.
    let Some(id) = body.get("id").cloned() else {
        return StatusCode::ACCEPTED.into_response();
    };

    match method.as_str() {
        "ping" => rpc_result(&id, json!({})).into_response(),
        "initialize" => {
            let reply = rpc_result(
                &id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "stub-mcp", "version": "0.0.1"},
                }),
            );
            ([(MCP_SESSION_HEADER, stub.session_id.clone())], reply).into_response()
        }
        "tools/list" => {
            let tools: Vec<Value> = stub
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "inputSchema": tool.schema,
                    })
                })
                .collect();
            rpc_result(&id, json!({"tools": tools})).into_response()
        }
        "tools/call" => {
            let name = body
                .pointer("/params/name")
                .and_then(Value::as_str)
                .unwrap_or_default();
            match stub.tools.iter().find(|tool| tool.name == name) {
                Some(tool) => rpc_result(
                    &id,
                    json!({
                        "content": [{"type": "text", "text": tool.reply}],
                        "isError": tool.is_error,
                    }),
                )
                .into_response(),
                None => rpc_error(&id, -32602, format!("unknown tool: {name}")).into_response(),
            }
        }
        _ => rpc_error(&id, -32601, format!("method not found: {method}")).into_response(),
    }
}

fn rpc_result(id: &Value, result: Value) -> Json<Value> {
    Json(json!({"jsonrpc": "2.0", "id": id, "result": result}))
}

fn rpc_error(id: &Value, code: i64, message: String) -> Json<Value> {
    Json(json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message},
    }))
}

/// Transport tuned for tests: short timeout, fast bounded retries.
pub fn fast_transport() -> Transport {
    Transport::new(
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
        },
        Duration::from_millis(500),
    )
}

/// An address that refuses connections: bind an ephemeral port, then drop
/// the listener before anyone dials it.
pub fn refused_url() -> Url {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).expect("bind probe listener");
    let addr = listener.local_addr().expect("probe listener address");
    drop(listener);
    Url::parse(&format!("http://{addr}/mcp")).expect("probe url")
}

// ============================================================================
// Scripted Model
// ============================================================================

/// What the scripted model observed on one `chat` call.
#[derive(Debug, Clone)]
pub struct SeenChat {
    pub tools: Vec<String>,
    pub history: Vec<Message>,
}

/// A model that replays canned replies in order.
///
/// When the queue runs dry it falls back to a completion signal, so a test
/// that scripts too few replies ends instead of hanging.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
    fallback: String,
    seen: Mutex<Vec<SeenChat>>,
}

impl ScriptedLlm {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|reply| reply.to_string()).collect()),
            fallback: r#"{"completed": true}"#.to_string(),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// A model that gives the same reply on every round and never completes.
    pub fn repeating(reply: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: reply.to_string(),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn next(&self) -> String {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }

    /// Number of `chat` calls observed.
    pub fn chats(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// What the model saw on the given `chat` call, 0-based.
    pub fn chat_at(&self, index: usize) -> SeenChat {
        self.seen.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        Ok(self.next())
    }

    async fn chat(
        &self,
        _system_prompt: &str,
        history: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<String, LlmError> {
        self.seen.lock().unwrap().push(SeenChat {
            tools: tools.iter().map(|tool| tool.name.clone()).collect(),
            history: history.to_vec(),
        });
        Ok(self.next())
    }

    fn model(&self) -> &str {
        "scripted-test-model"
    }
}
