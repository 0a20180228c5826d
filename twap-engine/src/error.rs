//! Engine error types.

use thiserror::Error;

/// Errors raised while planning a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// `floor(duration / interval)` is zero
    #[error("No orders to schedule: duration {duration_secs}s / interval {interval_secs}s")]
    NoOrders { duration_secs: u64, interval_secs: u64 },
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
