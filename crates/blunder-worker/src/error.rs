//! Worker error types

use std::time::Duration;

use thiserror::Error;

/// Failures talking to the external engine process.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Process could not be launched or failed the UCI handshake.
    #[error("Engine failed to start: {0}")]
    StartFailure(String),

    /// Malformed or out-of-sequence response.
    #[error("Engine protocol error: {0}")]
    Protocol(String),

    /// No terminating `bestmove` within the request deadline.
    #[error("Engine timed out after {0:?}")]
    Timeout(Duration),

    /// The engine closed its output stream (crashed or quit).
    #[error("Engine process exited unexpectedly")]
    Exited,

    /// An earlier request timed out and its response was never drained.
    #[error("Engine channel out of sync, restart required")]
    Desynchronised,

    #[error("Engine I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Whether the process can no longer be trusted and must be replaced.
    pub fn needs_restart(&self) -> bool {
        matches!(
            self,
            EngineError::Timeout(_)
                | EngineError::Exited
                | EngineError::Desynchronised
                | EngineError::Io(_)
        )
    }
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
