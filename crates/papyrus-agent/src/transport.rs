//! Transport abstraction for model calls

use std::{pin::Pin, sync::Arc};

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use papyrus_ai::{
    Context, Message, Model, Result, StreamOptions,
    providers::{LlmProvider, openai::OpenAICompatProvider, resolve_api_key},
    stream::{MessageEvent, PartialMessage},
};
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

use crate::events::AgentEvent;

/// Configuration for one model call
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// System prompt
    pub system_prompt: Option<String>,
    /// Available tools (as API definitions)
    pub tools: Vec<papyrus_ai::Tool>,
    /// Model to use
    pub model: Model,
    /// Maximum tokens per response
    pub max_tokens: Option<u32>,
    /// Temperature
    pub temperature: Option<f32>,
}

/// A stream of agent events
pub type AgentEventStream = Pin<Box<dyn Stream<Item = AgentEvent> + Send>>;

/// Runs a single assistant turn over the full message history
#[async_trait]
pub trait Transport: Send + Sync {
    async fn run(
        &self,
        messages: Vec<Message>,
        config: &RunConfig,
        cancel: CancellationToken,
    ) -> Result<AgentEventStream>;
}

/// Direct provider transport. Requests are made once; there are no retries.
pub struct ProviderTransport {
    provider: Arc<dyn LlmProvider>,
}

impl ProviderTransport {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// OpenAI-compatible transport for `model`, resolving its API key
    pub fn for_model(model: &Model, api_key: Option<&str>) -> Result<Self> {
        let key = resolve_api_key(model.provider, api_key)?;
        Ok(Self::new(Arc::new(OpenAICompatProvider::new(key))))
    }
}

#[async_trait]
impl Transport for ProviderTransport {
    async fn run(
        &self,
        messages: Vec<Message>,
        config: &RunConfig,
        cancel: CancellationToken,
    ) -> Result<AgentEventStream> {
        let context = Context {
            system_prompt: config.system_prompt.clone(),
            messages,
            tools: config.tools.clone(),
        };
        let options = StreamOptions {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        };
        let mut message_stream = self.provider.stream(&config.model, &context, &options).await?;

        let event_stream: AgentEventStream = Box::pin(stream! {
            let mut partial = PartialMessage::new();

            while let Some(event) = message_stream.next().await {
                if cancel.is_cancelled() {
                    yield AgentEvent::Error { message: "Cancelled".to_string() };
                    return;
                }

                partial.push(&event);

                match event {
                    MessageEvent::Start { message } => {
                        yield AgentEvent::MessageStart { message };
                    }
                    MessageEvent::TextDelta { .. }
                    | MessageEvent::ToolCallStart { .. }
                    | MessageEvent::ToolCallDelta { .. } => {
                        yield AgentEvent::MessageUpdate { message: partial.snapshot() };
                    }
                    MessageEvent::Done { message, usage, .. } => {
                        yield AgentEvent::MessageEnd { message, usage };
                    }
                    MessageEvent::Error { message } => {
                        yield AgentEvent::Error { message };
                        return;
                    }
                }
            }
        });

        Ok(event_stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use papyrus_ai::{Content, MessageEventStream, Provider, StopReason, Usage};

    struct CannedProvider;

    #[async_trait]
    impl LlmProvider for CannedProvider {
        async fn stream(
            &self,
            _model: &Model,
            context: &Context,
            _options: &StreamOptions,
        ) -> Result<MessageEventStream> {
            let echoed = context.messages.len();
            Ok(Box::pin(async_stream::stream! {
                yield MessageEvent::Start { message: Message::assistant(vec![]) };
                yield MessageEvent::TextDelta { delta: "saw ".into() };
                yield MessageEvent::TextDelta { delta: format!("{echoed}") };
                yield MessageEvent::Done {
                    message: Message::assistant(vec![Content::text(format!("saw {echoed}"))]),
                    stop_reason: StopReason::Stop,
                    usage: Usage { input: 7, output: 2 },
                };
            }))
        }
    }

    fn config() -> RunConfig {
        RunConfig {
            system_prompt: None,
            tools: vec![],
            model: Model::new(Provider::Ollama, "test"),
            max_tokens: None,
            temperature: Some(0.1),
        }
    }

    #[tokio::test]
    async fn test_events_follow_provider_stream() {
        let transport = ProviderTransport::new(Arc::new(CannedProvider));
        let stream = transport
            .run(vec![Message::user("a"), Message::user("b")], &config(), CancellationToken::new())
            .await
            .unwrap();
        let events: Vec<AgentEvent> = stream.collect().await;

        assert!(matches!(events[0], AgentEvent::MessageStart { .. }));
        match &events[2] {
            AgentEvent::MessageUpdate { message } => assert_eq!(message.text(), "saw 2"),
            other => panic!("expected update, got {:?}", other),
        }
        match events.last().unwrap() {
            AgentEvent::MessageEnd { message, usage } => {
                assert_eq!(message.text(), "saw 2");
                assert_eq!(usage.input, 7);
            }
            other => panic!("expected end, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_run_reports_error() {
        let transport = ProviderTransport::new(Arc::new(CannedProvider));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let events: Vec<AgentEvent> = transport
            .run(vec![], &config(), cancel)
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], AgentEvent::Error { message } if message == "Cancelled"));
    }
}
