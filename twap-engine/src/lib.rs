//! TWAP Engine Layer
//!
//! Pure decision logic, deterministic, no I/O.
//! Takes configuration and run state → returns what the next tick should do.

#![warn(clippy::all)]

pub mod error;
pub mod plan;

pub use error::{EngineError, EngineResult};
pub use plan::{limit_price, OrderPlan, SizeClamp, TickDecision, NEGLIGIBLE_REMAINDER};
