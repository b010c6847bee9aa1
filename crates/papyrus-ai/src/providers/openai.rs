//! OpenAI-compatible Chat Completions provider (Ollama, OpenAI, Groq, ...)

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};

use super::LlmProvider;
use crate::{
    error::{Error, Result},
    stream::{MessageEvent, MessageEventStream},
    types::{
        AssistantMetadata, Content, Context, Message, Model, StopReason, StreamOptions, Usage,
    },
};

/// Client for any endpoint that speaks `/chat/completions` with SSE streaming
pub struct OpenAICompatProvider {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl OpenAICompatProvider {
    /// Create a provider; `api_key` is sent as a bearer token when present
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }

    fn headers(&self, model: &Model) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(ref key) = self.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| Error::InvalidConfig(format!("API key header: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }
        for (key, value) in &model.headers {
            if let (Ok(name), Ok(val)) = (key.parse::<HeaderName>(), value.parse::<HeaderValue>()) {
                headers.insert(name, val);
            }
        }
        Ok(headers)
    }
}

#[async_trait]
impl LlmProvider for OpenAICompatProvider {
    async fn stream(
        &self,
        model: &Model,
        context: &Context,
        options: &StreamOptions,
    ) -> Result<MessageEventStream> {
        let request = build_request(model, context, options);
        let url = format!("{}/chat/completions", model.base_url);
        tracing::debug!(%url, model = %model.id, messages = request.messages.len(), "chat request");

        let request_builder = self
            .client
            .post(&url)
            .headers(self.headers(model)?)
            .json(&request);

        let event_source = EventSource::new(request_builder)
            .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))?;

        Ok(Box::pin(create_stream(event_source, model.clone())))
    }
}

fn build_request(model: &Model, context: &Context, options: &StreamOptions) -> ChatRequest {
    let mut messages = Vec::new();

    if let Some(ref system_prompt) = context.system_prompt {
        messages.push(WireMessage::text("system", system_prompt.clone()));
    }
    for msg in &context.messages {
        messages.push(convert_message(msg));
    }

    let tools: Vec<WireTool> = context
        .tools
        .iter()
        .map(|t| WireTool {
            tool_type: "function",
            function: WireFunction {
                name: t.name.clone(),
                description: Some(t.description.clone()),
                parameters: Some(t.parameters.clone()),
            },
        })
        .collect();

    let has_tools = !tools.is_empty();
    ChatRequest {
        model: model.id.clone(),
        messages,
        stream: true,
        stream_options: Some(WireStreamOptions { include_usage: true }),
        max_tokens: options.max_tokens,
        temperature: options.temperature,
        tools: has_tools.then_some(tools),
        tool_choice: has_tools.then(|| serde_json::json!("auto")),
    }
}

fn text_of(content: &[Content]) -> String {
    content
        .iter()
        .filter_map(|c| c.as_text())
        .collect::<Vec<_>>()
        .join("")
}

fn convert_message(msg: &Message) -> WireMessage {
    match msg {
        Message::User { content, .. } => WireMessage::text("user", text_of(content)),
        Message::Assistant { content, .. } => {
            let tool_calls: Vec<WireToolCall> = content
                .iter()
                .filter_map(|c| match c {
                    Content::ToolCall {
                        id,
                        name,
                        arguments,
                    } => Some(WireToolCall {
                        id: id.clone(),
                        call_type: "function",
                        function: WireFunctionCall {
                            name: name.clone(),
                            arguments: arguments.to_string(),
                        },
                    }),
                    _ => None,
                })
                .collect();
            let text = text_of(content);

            WireMessage {
                role: "assistant",
                content: (!text.is_empty()).then_some(text),
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                tool_call_id: None,
            }
        }
        Message::ToolResult {
            tool_call_id,
            content,
            ..
        } => WireMessage {
            role: "tool",
            content: Some(text_of(content)),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.clone()),
        },
    }
}

/// Tool calls accepted per message; deltas indexed past this are dropped
const MAX_TOOL_CALLS: usize = 64;

/// Slot for a tool call being assembled from deltas
#[derive(Default)]
struct ToolCallSlot {
    id: String,
    name: String,
    arguments: String,
}

/// Grow `slots` to hold `idx`; false when the index is out of range
fn reserve_slot(slots: &mut Vec<ToolCallSlot>, idx: usize) -> bool {
    if idx >= MAX_TOOL_CALLS {
        tracing::warn!(index = idx, "ignoring tool call delta with out-of-range index");
        return false;
    }
    if slots.len() <= idx {
        slots.resize_with(idx + 1, ToolCallSlot::default);
    }
    true
}

fn create_stream(
    mut event_source: EventSource,
    model: Model,
) -> impl futures::Stream<Item = MessageEvent> {
    stream! {
        let mut text = String::new();
        let mut slots: Vec<ToolCallSlot> = Vec::new();
        let mut finish_reason: Option<String> = None;
        let mut usage = Usage::default();

        yield MessageEvent::Start {
            message: Message::Assistant {
                content: vec![],
                metadata: AssistantMetadata {
                    model: Some(model.id.clone()),
                    provider: Some(model.provider),
                    ..Default::default()
                },
            },
        };

        while let Some(event) = event_source.next().await {
            match event {
                Ok(Event::Open) => {}
                Ok(Event::Message(msg)) => {
                    if msg.data == "[DONE]" {
                        break;
                    }

                    let chunk = match serde_json::from_str::<StreamChunk>(&msg.data) {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            yield MessageEvent::Error {
                                message: format!("Failed to parse chunk: {}", e),
                            };
                            event_source.close();
                            return;
                        }
                    };

                    for choice in &chunk.choices {
                        if let Some(ref delta) = choice.delta.content {
                            if !delta.is_empty() {
                                text.push_str(delta);
                                yield MessageEvent::TextDelta { delta: delta.clone() };
                            }
                        }

                        // Some servers (older Ollama) omit `index`; fall back to position.
                        for (pos, tc) in choice.delta.tool_calls.iter().flatten().enumerate() {
                            let idx = tc.index.unwrap_or(pos);
                            if !reserve_slot(&mut slots, idx) {
                                continue;
                            }
                            if let Some(ref id) = tc.id {
                                slots[idx].id = id.clone();
                            }
                            if let Some(ref function) = tc.function {
                                if let Some(ref name) = function.name {
                                    slots[idx].name = name.clone();
                                    yield MessageEvent::ToolCallStart {
                                        index: idx,
                                        id: slots[idx].id.clone(),
                                        name: name.clone(),
                                    };
                                }
                                if let Some(ref args) = function.arguments {
                                    slots[idx].arguments.push_str(args);
                                    yield MessageEvent::ToolCallDelta {
                                        index: idx,
                                        delta: args.clone(),
                                    };
                                }
                            }
                        }

                        if let Some(ref reason) = choice.finish_reason {
                            finish_reason = Some(reason.clone());
                        }
                    }

                    if let Some(ref u) = chunk.usage {
                        usage.input = u.prompt_tokens;
                        usage.output = u.completion_tokens;
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                    let body = response.text().await.unwrap_or_default();
                    yield MessageEvent::Error {
                        message: Error::api(status.as_u16(), body).to_string(),
                    };
                    event_source.close();
                    return;
                }
                Err(e) => {
                    yield MessageEvent::Error {
                        message: format!("SSE error: {}", e),
                    };
                    event_source.close();
                    return;
                }
            }
        }
        event_source.close();

        let mut content = Vec::new();
        if !text.is_empty() {
            content.push(Content::Text { text });
        }
        for (idx, slot) in slots.into_iter().enumerate() {
            if slot.name.is_empty() {
                continue;
            }
            let id = if slot.id.is_empty() { format!("call_{}", idx) } else { slot.id };
            let arguments = if slot.arguments.trim().is_empty() {
                serde_json::json!({})
            } else {
                serde_json::from_str(&slot.arguments).unwrap_or(serde_json::json!({}))
            };
            content.push(Content::ToolCall { id, name: slot.name, arguments });
        }

        let has_tool_calls = content.iter().any(|c| matches!(c, Content::ToolCall { .. }));
        let stop_reason = match finish_reason.as_deref() {
            Some("length") => StopReason::Length,
            Some("tool_calls") => StopReason::ToolUse,
            _ if has_tool_calls => StopReason::ToolUse,
            _ => StopReason::Stop,
        };

        let final_message = Message::Assistant {
            content,
            metadata: AssistantMetadata {
                provider: Some(model.provider),
                model: Some(model.id.clone()),
                usage: usage.clone(),
                stop_reason: Some(stop_reason),
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
        };

        yield MessageEvent::Done {
            message: final_message,
            stop_reason,
            usage,
        };
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<WireStreamOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct WireStreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl WireMessage {
    fn text(role: &'static str, text: String) -> Self {
        Self {
            role,
            content: Some(text),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: &'static str,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<StreamUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<StreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCall {
    index: Option<usize>,
    id: Option<String>,
    function: Option<StreamFunction>,
}

#[derive(Debug, Deserialize)]
struct StreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
