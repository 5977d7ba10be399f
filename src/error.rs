//! Error types shared by the search client, runner and result store.

/// Coarse classification of a [`MetricsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network-level failure talking to the search API.
    Transport,
    /// Non-2xx status, malformed JSON or missing expected fields.
    Decode,
    /// Missing or unparseable pagination metadata.
    Protocol,
    /// Statement, transaction or file failure against the store.
    Persistence,
    /// Missing token, invalid settings or query pairs.
    Configuration,
    /// A worker task died or a run lost rows.
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Database error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Worker error: {0}")]
    Worker(String),
}

impl MetricsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MetricsError::Transport(_) => ErrorKind::Transport,
            MetricsError::Decode(_) => ErrorKind::Decode,
            MetricsError::Protocol(_) => ErrorKind::Protocol,
            MetricsError::Persistence(_) | MetricsError::Io(_) => ErrorKind::Persistence,
            MetricsError::Configuration(_) => ErrorKind::Configuration,
            MetricsError::Worker(_) => ErrorKind::Internal,
        }
    }
}

impl From<toml::de::Error> for MetricsError {
    fn from(e: toml::de::Error) -> Self {
        MetricsError::Configuration(format!("invalid settings file: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, MetricsError>;
