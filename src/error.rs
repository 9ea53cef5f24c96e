//! Error types for Synheart Focus

use thiserror::Error;

/// Errors raised by the external classifier boundary
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifierError {
    #[error("Classifier call failed: {0}")]
    Failed(String),

    #[error("Classifier call timed out")]
    Timeout,

    #[error("Classifier call was cancelled")]
    Cancelled,

    #[error("Malformed classifier output: {0}")]
    MalformedOutput(String),
}

/// Errors that can occur while processing the heart-rate stream
#[derive(Debug, Error)]
pub enum FocusError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl FocusError {
    /// Whether the error came from the classifier and the cycle can be retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FocusError::Classifier(ClassifierError::Failed(_) | ClassifierError::Timeout)
        )
    }
}
