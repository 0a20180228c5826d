//! TWAP Daemon
//!
//! Runs one TWAP buy program and exits when it completes or on Ctrl-C.
//!
//! # Usage
//!
//! ```bash
//! # Dry run against the stub venue
//! TWAP_ENV=test TWAP_PAIR=ETH/USDC TWAP_TOTAL_AMOUNT=1000 \
//!     TWAP_DURATION_SECS=3600 TWAP_INTERVAL_SECS=300 cargo run -p twapd
//! ```
//!
//! # Environment Variables
//!
//! - `TWAP_ENV`: Environment (test, development, production)
//! - `TWAP_PAIR`: Market, e.g. `ETH/USDC`
//! - `TWAP_TOTAL_AMOUNT`: Total amount to buy
//! - `TWAP_DURATION_SECS` / `TWAP_INTERVAL_SECS`: Program length and slice spacing
//! - `TWAP_SLIPPAGE_TOLERANCE`: Limit price buffer (default: 0.01)
//! - `TWAP_MIN_ORDER_SIZE` / `TWAP_MAX_ORDER_SIZE`: Slice bounds (default: 10 / 100)
//! - `TWAP_VENUE_URL`, `TWAP_WALLET_ADDRESS`, `TWAP_WALLET_SECRET`: Venue access
//! - `TWAP_STATUS_POLL_SECS`: Completion poll (default: 5)
//! - `TWAP_RECONCILE_SECS`: Reconciliation sweep period (default: 0, disabled)
//! - `TWAP_CANCEL_ON_EXIT`: Cancel open orders on exit (default: true)

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use twapd::{Config, Daemon, Environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("twapd=info".parse()?))
        .init();

    // Load configuration
    let config = Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        pair = %config.twap.pair,
        "TWAP Daemon"
    );

    // Create and run daemon
    let summary = match config.environment {
        Environment::Test => Daemon::new_stub(config)?.run().await?,
        Environment::Development | Environment::Production => Daemon::new_venue(config)?.run().await?,
    };

    if let Some(summary) = summary {
        info!(
            executed = %summary.executed_amount,
            remaining = %summary.remaining_amount,
            average_price = ?summary.average_execution_price,
            "Final summary"
        );
    }

    Ok(())
}
