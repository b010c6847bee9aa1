//! Streaming event types and utilities

use crate::types::{Content, Message, StopReason, Usage};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

/// Events emitted while a response streams in
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageEvent {
    /// Initial (empty) assistant message
    Start { message: Message },
    /// Text content delta
    TextDelta { delta: String },
    /// A tool call began; `index` is the provider's slot for it
    ToolCallStart { index: usize, id: String, name: String },
    /// Partial JSON for a tool call's arguments
    ToolCallDelta { index: usize, delta: String },
    /// Message completed successfully
    Done {
        message: Message,
        stop_reason: StopReason,
        usage: Usage,
    },
    /// Error occurred
    Error { message: String },
}

impl MessageEvent {
    /// Check if this is a terminal event (Done or Error)
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageEvent::Done { .. } | MessageEvent::Error { .. })
    }
}

/// A stream of message events
pub type MessageEventStream = Pin<Box<dyn Stream<Item = MessageEvent> + Send>>;

/// Accumulates deltas into a partial assistant message for display.
///
/// The final message always comes from [`MessageEvent::Done`]; this is only
/// for rendering progress.
#[derive(Debug, Default)]
pub struct PartialMessage {
    text: String,
    tool_calls: Vec<PartialToolCall>,
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments_json: String,
}

impl PartialMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the partial state
    pub fn push(&mut self, event: &MessageEvent) {
        match event {
            MessageEvent::TextDelta { delta } => self.text.push_str(delta),
            MessageEvent::ToolCallStart { index, id, name } => {
                let slot = self.slot(*index);
                if !id.is_empty() {
                    slot.id = id.clone();
                }
                slot.name = name.clone();
            }
            MessageEvent::ToolCallDelta { index, delta } => {
                self.slot(*index).arguments_json.push_str(delta);
            }
            _ => {}
        }
    }

    /// Snapshot the current state as an assistant message. Tool-call
    /// arguments that are not yet valid JSON show up as `null`.
    pub fn snapshot(&self) -> Message {
        let mut content = Vec::new();
        if !self.text.is_empty() {
            content.push(Content::text(self.text.clone()));
        }
        for call in self.tool_calls.iter().filter(|c| !c.name.is_empty()) {
            let arguments = serde_json::from_str(&call.arguments_json)
                .unwrap_or(serde_json::Value::Null);
            content.push(Content::tool_call(call.id.clone(), call.name.clone(), arguments));
        }
        Message::assistant(content)
    }

    fn slot(&mut self, index: usize) -> &mut PartialToolCall {
        if self.tool_calls.len() <= index {
            self.tool_calls.resize_with(index + 1, PartialToolCall::default);
        }
        &mut self.tool_calls[index]
    }
}
