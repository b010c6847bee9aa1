//! Error types for papyrus-agent

use thiserror::Error;

/// Result type alias using papyrus-agent Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running the graph
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the model layer
    #[error(transparent)]
    Ai(#[from] papyrus_ai::Error),

    /// Reading or writing checkpoints failed
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    /// The run took more node steps than allowed
    #[error("recursion limit of {0} steps reached without finishing")]
    RecursionLimit(u32),

    /// `invoke` was called while the thread waits for approval
    #[error("thread {0} is waiting for tool approval")]
    AwaitingApproval(String),

    /// `resume` was called on a thread with nothing to approve
    #[error("thread {0} has no pending approval")]
    NoPendingApproval(String),

    /// `resume` was called with a token from a different interrupt
    #[error("approval token does not match the pending interrupt")]
    ApprovalMismatch,

    /// Talking to the MCP tool server failed
    #[error("MCP error: {0}")]
    Mcp(String),

    /// The model call failed mid-stream
    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Checkpoint(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Checkpoint(e.to_string())
    }
}
