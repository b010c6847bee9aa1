//! The agent graph: assistant -> router -> tools | human approval -> ...
//!
//! Each thread's progress is checkpointed after every node transition. A
//! run pauses at the human node, returning [`RunOutcome::Interrupted`]; the
//! caller later answers with [`Graph::resume`].

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use papyrus_ai::{Content, Message, Model, ToolCall, Usage};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::error::{Error, Result};
use crate::events::AgentEvent;
use crate::state::{ConversationState, Decision, Node};
use crate::tool::{BoxedTool, ToolResult, to_api_tool};
use crate::transport::{RunConfig, Transport};

/// Tools that need a human's go-ahead before they run
pub const RISKY_TOOLS: &[&str] = &["download_papers", "delete_papers"];

/// Tool result recorded for each call the human rejected
pub const SKIP_MESSAGE: &str = "Skip the tool calling!";

const APPROVALS: &[&str] = &["continue", "y", "yes"];

#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub system_prompt: Option<String>,
    pub model: Model,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Node steps allowed per run before giving up
    pub recursion_limit: u32,
    pub risky_tools: Vec<String>,
}

impl GraphConfig {
    pub fn new(model: Model) -> Self {
        Self {
            system_prompt: None,
            model,
            temperature: Some(0.1),
            max_tokens: None,
            recursion_limit: 10,
            risky_tools: RISKY_TOOLS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// What the human is asked before a risky tool runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingApproval {
    pub token: Uuid,
    pub tool_name: String,
    pub prompt: String,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Reached the end node
    Completed(ConversationState),
    /// Paused at the human node
    Interrupted(PendingApproval),
}

/// Where to go after the assistant spoke
pub fn route(calls: &[ToolCall], risky_tools: &[String]) -> Node {
    if calls.is_empty() {
        Node::End
    } else if calls.iter().any(|c| risky_tools.iter().any(|r| r == &c.name)) {
        Node::Human
    } else {
        Node::Tools
    }
}

/// Whether a human reply approves the pending tool calls
pub fn is_approval(reply: &str) -> bool {
    APPROVALS.contains(&reply.trim().to_lowercase().as_str())
}

pub struct Graph {
    config: GraphConfig,
    tools: Vec<BoxedTool>,
    schema_cache: HashMap<String, Arc<jsonschema::Validator>>,
    transport: Arc<dyn Transport>,
    store: Arc<dyn CheckpointStore>,
    event_tx: broadcast::Sender<AgentEvent>,
}

impl Graph {
    pub fn new(
        config: GraphConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            config,
            tools: vec![],
            schema_cache: HashMap::new(),
            transport,
            store,
            event_tx,
        }
    }

    /// Subscribe to graph events
    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.event_tx.subscribe()
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Set all tools, caching their schema validators
    pub fn set_tools(&mut self, tools: Vec<BoxedTool>) {
        self.schema_cache.clear();
        for tool in &tools {
            let schema = tool.parameters_schema();
            match jsonschema::validator_for(&schema) {
                Ok(validator) => {
                    self.schema_cache
                        .insert(tool.name().to_string(), Arc::new(validator));
                }
                Err(e) => {
                    tracing::warn!(tool = tool.name(), error = %e, "invalid parameter schema, skipping validation");
                }
            }
        }
        self.tools = tools;
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Current state of a thread (empty for a new thread)
    pub fn state(&self, thread: &str) -> Result<ConversationState> {
        Ok(self
            .store
            .latest(thread)?
            .map(|cp| cp.state)
            .unwrap_or_default())
    }

    /// The approval a thread is waiting on, if any
    pub fn pending(&self, thread: &str) -> Result<Option<PendingApproval>> {
        Ok(self.store.latest(thread)?.and_then(|cp| cp.pending))
    }

    pub fn threads(&self) -> Result<Vec<String>> {
        self.store.threads()
    }

    /// Add a user message to `thread` and run until the graph ends or pauses
    pub async fn invoke(&self, thread: &str, text: &str) -> Result<RunOutcome> {
        let latest = self.store.latest(thread)?;
        if latest.as_ref().is_some_and(|cp| cp.pending.is_some()) {
            return Err(Error::AwaitingApproval(thread.to_string()));
        }
        let mut state = latest.map(|cp| cp.state).unwrap_or_default();
        state.messages.push(Message::user(text));
        self.checkpoint(thread, 0, Node::Assistant, &state, None)?;
        self.run_from(thread, state, Node::Assistant).await
    }

    /// Answer a pending approval and continue the run
    pub async fn resume(&self, thread: &str, token: Uuid, reply: &str) -> Result<RunOutcome> {
        let Some(cp) = self.store.latest(thread)? else {
            return Err(Error::NoPendingApproval(thread.to_string()));
        };
        let Some(pending) = cp.pending else {
            return Err(Error::NoPendingApproval(thread.to_string()));
        };
        if pending.token != token {
            return Err(Error::ApprovalMismatch);
        }

        let mut state = cp.state;
        let next = if is_approval(reply) {
            tracing::info!(thread, tool = %pending.tool_name, "tool call approved");
            state.decision = Some(Decision::Continue);
            Node::Tools
        } else {
            tracing::info!(thread, tool = %pending.tool_name, reply, "tool call rejected");
            state.decision = Some(Decision::Reject);
            for call in state.pending_tool_calls() {
                state.messages.push(Message::tool_result(
                    call.id,
                    call.name,
                    vec![Content::text(SKIP_MESSAGE)],
                    false,
                ));
            }
            Node::End
        };
        self.checkpoint(thread, cp.step, next, &state, None)?;
        self.run_from(thread, state, next).await
    }

    async fn run_from(
        &self,
        thread: &str,
        mut state: ConversationState,
        start: Node,
    ) -> Result<RunOutcome> {
        let limit = self.config.recursion_limit;
        let mut usage = Usage::default();
        let mut node = start;
        let mut step = 0u32;

        loop {
            if node == Node::End {
                let _ = self.event_tx.send(AgentEvent::RunEnd {
                    steps: step,
                    usage: usage.clone(),
                });
                tracing::debug!(thread, steps = step, "run finished");
                return Ok(RunOutcome::Completed(state));
            }
            if step >= limit {
                tracing::warn!(thread, limit, "recursion limit reached");
                return Err(Error::RecursionLimit(limit));
            }
            step += 1;
            let _ = self.event_tx.send(AgentEvent::NodeStart { node, step });
            tracing::debug!(thread, %node, step, "entering node");

            node = match node {
                Node::Assistant => {
                    let (message, turn_usage) = self.call_model(&state).await?;
                    usage.add(&turn_usage);
                    let next = route(&message.tool_calls(), &self.config.risky_tools);
                    state.messages.push(message);
                    next
                }
                Node::Tools => {
                    self.run_tools(&mut state).await;
                    Node::Assistant
                }
                Node::Human => {
                    let calls = state.pending_tool_calls();
                    let tool_name = calls.first().map(|c| c.name.clone()).unwrap_or_default();
                    let pending = PendingApproval {
                        token: Uuid::new_v4(),
                        prompt: format!("Do you want me to process this tool: {}?", tool_name),
                        tool_name,
                    };
                    self.checkpoint(thread, step, Node::Human, &state, Some(pending.clone()))?;
                    let _ = self.event_tx.send(AgentEvent::Interrupt {
                        token: pending.token,
                        tool_name: pending.tool_name.clone(),
                        prompt: pending.prompt.clone(),
                    });
                    return Ok(RunOutcome::Interrupted(pending));
                }
                Node::End => Node::End,
            };
            self.checkpoint(thread, step, node, &state, None)?;
        }
    }

    fn checkpoint(
        &self,
        thread: &str,
        step: u32,
        next: Node,
        state: &ConversationState,
        pending: Option<PendingApproval>,
    ) -> Result<()> {
        self.store.put(
            thread,
            &Checkpoint {
                step,
                next,
                state: state.clone(),
                pending,
                created_at: chrono::Utc::now().timestamp_millis(),
            },
        )
    }

    async fn call_model(&self, state: &ConversationState) -> Result<(Message, Usage)> {
        let config = RunConfig {
            system_prompt: self.config.system_prompt.clone(),
            tools: self.tools.iter().map(|t| to_api_tool(t.as_ref())).collect(),
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };
        let mut events = self
            .transport
            .run(state.messages.clone(), &config, CancellationToken::new())
            .await?;

        let mut result = None;
        while let Some(event) = events.next().await {
            let _ = self.event_tx.send(event.clone());
            match event {
                AgentEvent::MessageEnd { message, usage } => result = Some((message, usage)),
                AgentEvent::Error { message } => {
                    tracing::error!(error = %message, "model call failed");
                    return Err(Error::Other(message));
                }
                _ => {}
            }
        }
        result.ok_or_else(|| Error::Other("model stream ended without a message".into()))
    }

    async fn run_tools(&self, state: &mut ConversationState) {
        for call in state.pending_tool_calls() {
            let _ = self.event_tx.send(AgentEvent::ToolExecutionStart {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                arguments: call.arguments.clone(),
            });

            let result = self.execute_tool(&call).await;

            let _ = self.event_tx.send(AgentEvent::ToolExecutionEnd {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                result: result.text_content(),
                is_error: result.is_error,
            });
            state.messages.push(Message::tool_result(
                call.id,
                call.name,
                result.content,
                result.is_error,
            ));
        }
    }

    async fn execute_tool(&self, call: &ToolCall) -> ToolResult {
        let Some(tool) = self.tools.iter().find(|t| t.name() == call.name) else {
            tracing::warn!(tool = %call.name, "model asked for an unknown tool");
            return ToolResult::error(format!("Tool not found: {}", call.name));
        };
        if let Some(err) = self
            .schema_cache
            .get(call.name.as_str())
            .and_then(|validator| validate_with_validator(&call.arguments, validator))
        {
            return ToolResult::error(err);
        }
        tracing::info!(tool = %call.name, "running tool");
        tool.execute(&call.id, call.arguments.clone(), CancellationToken::new())
            .await
    }
}

/// Validate tool arguments using a pre-compiled validator.
/// Returns `Some(error_message)` if validation fails, `None` if valid.
fn validate_with_validator(
    args: &serde_json::Value,
    validator: &jsonschema::Validator,
) -> Option<String> {
    let errors: Vec<String> = validator
        .iter_errors(args)
        .map(|e| {
            let path = e.instance_path.to_string();
            if path.is_empty() {
                e.to_string()
            } else {
                format!("{}: {}", path, e)
            }
        })
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(format!(
            "Tool argument validation failed:\n{}",
            errors.join("\n")
        ))
    }
}
