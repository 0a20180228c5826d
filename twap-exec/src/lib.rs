//! TWAP Execution Layer
//!
//! Runs a TWAP program against a venue.
//!
//! # Architecture
//!
//! ```text
//! Timer → OrderPlan::decide → ExchangePort (retry) → fold into RunState
//! ```
//!
//! # Components
//!
//! - **Ports**: Traits for the venue (`ExchangePort`) and the signing identity (`WalletPort`)
//! - **Executor**: Owns the run state and the timer, folds venue answers
//! - **Retry**: Bounded exponential backoff for transient venue failures
//! - **Stub**: Test implementations for development
//!
//! # Example
//!
//! ```rust,ignore
//! use twap_exec::{StubExchange, TwapExecutor};
//! use std::sync::Arc;
//!
//! let exchange = Arc::new(StubExchange::new(dec!(1.00)));
//! let executor = TwapExecutor::new(config, exchange)?;
//!
//! executor.start().await?;
//! // ...
//! executor.stop();
//! println!("{:?}", executor.summary());
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod executor;
pub mod ports;
pub mod retry;
pub mod stub;

// Re-exports for convenience
pub use error::{ExecError, ExecResult};
pub use executor::TwapExecutor;
pub use ports::{ExchangePort, OrderResponse, WalletPort};
pub use retry::{is_transient, RetryPolicy, DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_ATTEMPTS};
pub use stub::{FillMode, StubExchange, StubWallet, SubmittedOrder};
