//! TWAP Domain Layer
//!
//! Pure domain logic with zero I/O dependencies.
//! Contains the program configuration, run entities and value objects.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod config;
pub mod entities;
pub mod value_objects;

// Re-export commonly used types
pub use config::TwapConfig;
pub use entities::{
    EngineStatus, OrderExecution, OrderStatus, RunId, RunState, RunSummary, StopReason,
};
pub use value_objects::{
    parse_decimal, to_fixed, truncate_fixed, DomainError, OrderSide, OrderType, TradingPair,
    FIXED_DECIMALS,
};
