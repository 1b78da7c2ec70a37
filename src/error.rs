//! ChemSnap error types

use std::time::Duration;

/// ChemSnap error types
#[derive(Debug, thiserror::Error)]
pub enum ChemSnapError {
    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({code}): {message}")]
    Api { code: String, message: String },

    #[error("throttled by provider, retry after {retry_after:?}")]
    Throttled { retry_after: Option<Duration> },

    #[error("authentication with provider failed")]
    AuthenticationFailed,

    /// Caller-supplied product key did not match the configured secret.
    /// Checked by the gateway before any remote call is made.
    #[error("invalid API key")]
    InvalidApiKey,

    #[error("model not found: {0}")]
    ModelNotFound(String),

    // Streaming errors
    #[error("stream error: {0}")]
    Stream(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Model response arrived but did not have the expected envelope shape
    /// (e.g. no text content block). Distinct from unparseable model *text*,
    /// which degrades to an error record instead of an error.
    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    // Configuration errors
    #[error("no provider configured")]
    NoProvider,

    #[error("configuration error: {0}")]
    Configuration(String),

    // Soft errors
    #[error("empty response from model")]
    EmptyResponse,
}

impl ChemSnapError {
    /// Whether this error should be retried.
    ///
    /// Only provider throttling is retryable; every other failure — auth,
    /// transport, malformed responses — is returned immediately and scoped
    /// to the batch that hit it.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChemSnapError::Throttled { .. })
    }

    /// Provider-supplied retry-after hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ChemSnapError::Throttled { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Result type alias for ChemSnap operations
pub type Result<T> = std::result::Result<T, ChemSnapError>;
