//! Error handling for the LabWatch client

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level failure (network error, request build failure)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("Backend returned {status} for {endpoint}")]
    Status {
        endpoint: String,
        status: reqwest::StatusCode,
    },

    /// Backend reported an error inside an otherwise valid payload
    #[error("Backend payload error: {0}")]
    Payload(String),

    /// Malformed response body
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (report export)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config error
    #[error("Config error: {0}")]
    Config(String),

    /// Operation requires an active room context
    #[error("No room selected: {0}")]
    NoRoomSelected(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the backend flagged the problem inside an otherwise valid
    /// payload, as opposed to a transport failure. Soft failures are
    /// logged quieter but degrade the snapshot the same way.
    pub fn is_soft(&self) -> bool {
        matches!(self, Error::Payload(_))
    }
}
