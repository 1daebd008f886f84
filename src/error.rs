// Crate-wide error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReelVaultError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("xml error: {0}")]
    Xml(String),

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("file record not found: {0}")]
    FileNotFound(String),

    #[error("job not found: {0}")]
    JobNotFound(i64),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("metadata probe error: {0}")]
    Metadata(String),

    #[error("hash error: {0}")]
    Hash(String),

    #[error("camera identification error: {0}")]
    CameraMatch(String),

    #[error("sidecar error: {0}")]
    Sidecar(String),

    #[error("background service error: {0}")]
    Lifecycle(String),

    /// Raised by the copy engine once the consecutive-failure counter on a network
    /// source crosses the configured abort threshold. This is the one condition the
    /// orchestrator is required to pattern-match on rather than treat as a generic
    /// failure: it drives the `copying -> paused` transition, not `failed`.
    #[error("network abort after {consecutive_failures} consecutive failures")]
    NetworkAbort { consecutive_failures: u32 },

    #[error("session cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for ReelVaultError {
    fn from(err: anyhow::Error) -> Self {
        ReelVaultError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReelVaultError>;
