//! Error types for the background removal pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Error types for background removal pipeline operations
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image format or processing errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// A model session failed to initialize on both the accelerated and the
    /// fallback execution provider. Terminal for that session.
    #[error("Session load error for {kind}: {reason}")]
    SessionLoad {
        /// Which network failed to load
        kind: crate::models::ModelKind,
        /// Underlying failure description
        reason: String,
    },

    /// A cascade stage's inference call failed. Aborts the entire run.
    #[error("Inference error: {0}")]
    Inference(String),

    /// The run was cancelled via its cancellation token.
    ///
    /// Used internally to unwind the cascade; the orchestrator converts it
    /// into [`PipelineOutcome::Cancelled`](crate::types::PipelineOutcome)
    /// before returning, so callers of the high-level API never observe it
    /// as a failure.
    #[error("Run cancelled")]
    Cancelled,

    /// A second run was submitted while one was already active.
    #[error("A pipeline run is already in progress")]
    RunInProgress,

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Network errors during model download
    #[error("Network error: {0}")]
    Network(String),

    /// Memory allocation or processing errors
    #[error("Processing error: {0}")]
    Processing(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a session load error for the given model kind
    pub fn session_load<S: Into<String>>(kind: crate::models::ModelKind, reason: S) -> Self {
        Self::SessionLoad {
            kind,
            reason: reason.into(),
        }
    }

    /// Whether this error is the distinguished cancellation outcome
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
