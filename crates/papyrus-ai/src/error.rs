//! Error types for papyrus-ai

use thiserror::Error;

/// Result type alias using papyrus-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to a chat model endpoint
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Endpoint answered with an error payload or status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The provider needs a key and none was found
    #[error("missing API key: set {0}")]
    MissingApiKey(&'static str),

    /// Server-sent events error
    #[error("SSE error: {0}")]
    Sse(String),

    /// Request was cancelled by the caller
    #[error("Request aborted")]
    Aborted,

    /// Invalid configuration (base URL, headers)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create an API error from a status code and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let e = Error::api(404, "model 'llama9' not found");
        assert_eq!(e.to_string(), "API error (404): model 'llama9' not found");
    }

    #[test]
    fn test_missing_key_names_variable() {
        let e = Error::MissingApiKey("OPENAI_API_KEY");
        assert!(e.to_string().contains("OPENAI_API_KEY"));
    }
}
