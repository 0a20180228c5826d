//! TWAP Daemon Library
//!
//! Process host for the TWAP execution engine.
//!
//! # Architecture
//!
//! ```text
//! Config (env) → Daemon → TwapExecutor → VenueRestClient → Venue
//!                  ↑
//!           Ctrl-C / shutdown token, completion poll, reconciliation sweep
//! ```
//!
//! # Components
//!
//! - **Daemon**: Starts the run, wires signals to `stop()`, detects completion
//! - **Config**: Environment-based configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use twapd::{Config, Daemon};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("Failed to load config");
//!     let daemon = Daemon::new_stub(config).expect("Invalid program");
//!     daemon.run().await.expect("Daemon error");
//! }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod daemon;
pub mod error;

// Re-exports for convenience
pub use config::{Config, Environment, RuntimeConfig, VenueConfig};
pub use daemon::Daemon;
pub use error::{DaemonError, DaemonResult};
