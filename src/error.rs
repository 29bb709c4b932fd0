//! Error types for the property analyzer

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for analyzer operations
pub type Result<T> = std::result::Result<T, PropvestError>;

#[derive(Error, Debug)]
pub enum PropvestError {

    // =============================
    // Financial Model Errors
    // =============================

    #[error("Invalid input for {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("Degenerate result: {0}")]
    DegenerateResult(String),

    // =============================
    // Session Errors
    // =============================

    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    // =============================
    // Service Errors
    // =============================

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("GEMINI_API_KEY not configured")]
    MissingApiKey,

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Base64 decode error: {0}")]
    DecodeError(#[from] base64::DecodeError),
}

impl PropvestError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        PropvestError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    /// True for errors caused by the caller's numbers rather than the service
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            PropvestError::InvalidInput { .. } | PropvestError::DegenerateResult(_)
        )
    }
}
