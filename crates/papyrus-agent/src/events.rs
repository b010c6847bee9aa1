//! Agent event types

use papyrus_ai::{Message, Usage};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::Node;

/// Events emitted while the graph runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// The graph entered a node
    NodeStart { node: Node, step: u32 },

    /// Message streaming started
    MessageStart { message: Message },

    /// Message content updated during streaming
    MessageUpdate { message: Message },

    /// Message completed
    MessageEnd { message: Message, usage: Usage },

    /// Tool execution started
    ToolExecutionStart {
        tool_call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },

    /// Tool execution completed
    ToolExecutionEnd {
        tool_call_id: String,
        tool_name: String,
        result: String,
        is_error: bool,
    },

    /// The run paused for human approval
    Interrupt {
        token: Uuid,
        tool_name: String,
        prompt: String,
    },

    /// The run reached the end node
    RunEnd { steps: u32, usage: Usage },

    /// Error occurred
    Error { message: String },
}

impl AgentEvent {
    /// Check if this event ends a run (or pauses it)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentEvent::RunEnd { .. } | AgentEvent::Interrupt { .. } | AgentEvent::Error { .. }
        )
    }
}
