//! Error types shared by the library modules.
//!
//! Provider and normalization errors are recoverable per track; only
//! `SyncError` variants abort an invocation.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure reported by a source or destination library capability.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Connection error: {0}")]
    Network(String),

    #[error("API rate limit exceeded")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Transient errors are worth a cooldown and another try.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }
}

impl From<ureq::Error> for ProviderError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(429, response) => {
                let retry_after = response
                    .header("Retry-After")
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs);
                ProviderError::RateLimited { retry_after }
            }
            ureq::Error::Status(status, response) => {
                let message = response
                    .into_string()
                    .unwrap_or_else(|_| "<unreadable body>".to_string());
                ProviderError::Api { status, message }
            }
            ureq::Error::Transport(transport) => ProviderError::Network(transport.to_string()),
        }
    }
}

impl From<std::io::Error> for ProviderError {
    fn from(err: std::io::Error) -> Self {
        ProviderError::Decode(err.to_string())
    }
}

/// Machine translation backend failure.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("translation request failed: {0}")]
    Request(String),

    #[error("unexpected translation response: {0}")]
    Response(String),
}

/// Romanization backend failure.
#[derive(Debug, Error)]
#[error("no transliteration scheme for language '{0}'")]
pub struct TransliterateError(pub String);

/// Errors that abort the current invocation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Caller contract violation, e.g. a record without a title.
    #[error("structural error: {0}")]
    Structural(String),

    #[error("cannot access {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type SyncResult<T> = Result<T, SyncError>;
