//! Chat model providers

pub mod openai;

use crate::{Context, Error, MessageEventStream, Model, Provider, Result, StreamOptions};
use async_trait::async_trait;

/// Trait for chat model providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stream a response from the model
    async fn stream(
        &self,
        model: &Model,
        context: &Context,
        options: &StreamOptions,
    ) -> Result<MessageEventStream>;
}

/// Resolve the API key for a provider: an explicit key wins, then the
/// provider's environment variable. Providers without a key variable
/// (Ollama, custom servers) resolve to `None`.
pub fn resolve_api_key(provider: Provider, explicit: Option<&str>) -> Result<Option<String>> {
    if let Some(key) = explicit.filter(|k| !k.trim().is_empty()) {
        return Ok(Some(key.to_string()));
    }
    match provider.api_key_env_var() {
        Some(var) => std::env::var(var)
            .map(Some)
            .map_err(|_| Error::MissingApiKey(var)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_key_wins() {
        let key = resolve_api_key(Provider::OpenAI, Some("sk-test")).unwrap();
        assert_eq!(key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_ollama_needs_no_key() {
        assert!(resolve_api_key(Provider::Ollama, None).unwrap().is_none());
        assert!(resolve_api_key(Provider::Custom, Some("  ")).unwrap().is_none());
    }
}
