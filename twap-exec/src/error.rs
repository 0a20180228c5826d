//! Execution layer error types.

use thiserror::Error;

use crate::retry::is_transient;

/// Errors that can occur during execution operations.
#[derive(Debug, Clone, Error)]
pub enum ExecError {
    /// Transport-level failure (connect, reset, DNS, ...)
    #[error("Network error: {0}")]
    Network(String),

    /// Request did not complete in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Venue answered with a non-success HTTP status
    #[error("Venue returned HTTP {status}: {message}")]
    Venue { status: u16, message: String },

    /// Order was rejected by the venue
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// Venue response lacks a required field
    #[error("Venue response missing field: {0}")]
    MissingField(String),

    /// Venue response could not be decoded
    #[error("Failed to parse venue response: {0}")]
    Parse(String),

    /// Amount cannot be converted to venue units
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Request signing failed
    #[error("Signing error: {0}")]
    Signing(String),

    /// Domain error
    #[error("Domain error: {0}")]
    Domain(#[from] twap_domain::DomainError),

    /// Engine error
    #[error("Engine error: {0}")]
    Engine(#[from] twap_engine::EngineError),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ExecError {
    /// Whether the error is transient: any 5xx or 429 venue answer, or a
    /// message matching the transient-failure vocabulary.
    ///
    /// Classification falls back to the message so that errors from any
    /// adapter are treated alike.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Venue { status: 429 | 500..=599, .. } => true,
            _ => is_transient(&self.to_string()),
        }
    }
}

/// Result type for execution operations.
pub type ExecResult<T> = Result<T, ExecError>;
