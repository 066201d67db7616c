//! Error types for Atelier Core.

use atelier_abstraction::ModelError;
use thiserror::Error;

/// Core error type for design pipeline operations.
#[derive(Error, Debug)]
pub enum DesignError {
    /// Transport or provider failure while talking to the completion model.
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// The accumulated model output is not parseable as JSON or fails schema
    /// validation. Expected to occur occasionally: the upstream model is not
    /// contractually guaranteed to conform.
    #[error("Model returned unexpected data: {0}")]
    MalformedOutput(String),

    /// The caller's output channel closed before the stream finished.
    #[error("Output channel closed: {0}")]
    ChannelClosed(#[from] std::io::Error),
}

/// Result type alias for design pipeline operations.
pub type Result<T> = std::result::Result<T, DesignError>;
