//! Error types for papyrus-arxiv

use thiserror::Error;

/// Result type alias using papyrus-arxiv Error
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The free-text query was empty or whitespace
    #[error("invalid query: {0:?}")]
    EmptyQuery(String),

    /// A category prefix outside the arXiv taxonomy
    #[error("invalid category: {0}")]
    InvalidCategory(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// arXiv answered with a non-success status
    #[error("arXiv API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The Atom feed could not be parsed
    #[error("feed error: {0}")]
    Feed(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
