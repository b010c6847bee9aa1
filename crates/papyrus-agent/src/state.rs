//! Conversation state carried between graph nodes

use papyrus_ai::{Message, ToolCall};
use serde::{Deserialize, Serialize};

/// Outcome of the last human approval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Continue,
    Reject,
}

/// Nodes of the agent graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Assistant,
    Tools,
    Human,
    End,
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Node::Assistant => "assistant",
            Node::Tools => "tools",
            Node::Human => "human",
            Node::End => "end",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub decision: Option<Decision>,
}

impl ConversationState {
    /// Tool calls requested by the most recent assistant message
    pub fn pending_tool_calls(&self) -> Vec<ToolCall> {
        self.messages
            .iter()
            .rev()
            .find(|m| matches!(m, Message::Assistant { .. }))
            .map(Message::tool_calls)
            .unwrap_or_default()
    }

    /// The last assistant reply's text, if any
    pub fn last_reply(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| matches!(m, Message::Assistant { .. }))
            .map(Message::text)
    }
}
