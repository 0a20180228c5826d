//! Daemon: Main runtime host.
//!
//! The Daemon ties together:
//! - TWAP executor (the run itself)
//! - Venue gateway (REST client, or the stub in the test environment)
//! - Signal handling and completion polling
//!
//! # Lifecycle
//!
//! 1. Load configuration
//! 2. Wire gateway and executor
//! 3. Start the run
//! 4. Main loop: Ctrl-C / shutdown → `stop()`, poll `is_active()`, optional reconciliation sweep
//! 5. Cancel orders left open, log the final summary

use std::future::pending;
use std::sync::Arc;

use rust_decimal_macros::dec;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use twap_connectors::{HmacWallet, VenueRestClient};
use twap_domain::RunSummary;
use twap_exec::{ExchangePort, StubExchange, TwapExecutor};

use crate::config::Config;
use crate::error::{DaemonError, DaemonResult};

// =============================================================================
// Daemon
// =============================================================================

/// The TWAP daemon.
pub struct Daemon<E: ExchangePort + 'static> {
    /// Configuration
    config: Config,
    /// The run
    executor: TwapExecutor<E>,
    /// Programmatic shutdown (same effect as Ctrl-C)
    shutdown: CancellationToken,
}

impl Daemon<StubExchange> {
    /// Create a new daemon against the stub venue (for testing/development).
    pub fn new_stub(config: Config) -> DaemonResult<Self> {
        let exchange = Arc::new(StubExchange::new(dec!(1.00)));
        Self::new(config, exchange)
    }
}

impl Daemon<VenueRestClient> {
    /// Create a new daemon against the configured venue.
    pub fn new_venue(config: Config) -> DaemonResult<Self> {
        let missing = |key: &str| DaemonError::Config(format!("Missing {}", key));

        let url = config.venue.url.clone().ok_or_else(|| missing("TWAP_VENUE_URL"))?;
        let address = config
            .venue
            .wallet_address
            .clone()
            .ok_or_else(|| missing("TWAP_WALLET_ADDRESS"))?;
        let secret = config
            .venue
            .wallet_secret
            .clone()
            .ok_or_else(|| missing("TWAP_WALLET_SECRET"))?;

        let wallet = Arc::new(HmacWallet::new(address, secret)?);
        let exchange = Arc::new(VenueRestClient::new(url, wallet)?);

        Self::new(config, exchange)
    }
}

impl<E: ExchangePort + 'static> Daemon<E> {
    /// Create a new daemon with a provided gateway.
    pub fn new(config: Config, exchange: Arc<E>) -> DaemonResult<Self> {
        let executor = TwapExecutor::new(config.twap.clone(), exchange)?;

        Ok(Self {
            config,
            executor,
            shutdown: CancellationToken::new(),
        })
    }

    /// The executor driving the run.
    pub fn executor(&self) -> &TwapExecutor<E> {
        &self.executor
    }

    /// Token that stops the daemon when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the daemon.
    ///
    /// Blocks until the run completes or shutdown is requested (Ctrl-C or
    /// the shutdown token). Returns the final summary.
    pub async fn run(&self) -> DaemonResult<Option<RunSummary>> {
        let plan = self.executor.plan();
        info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %self.config.environment,
            pair = %self.config.twap.pair,
            total_amount = %self.config.twap.total_amount,
            number_of_orders = plan.number_of_orders,
            nominal_size = %plan.nominal_size,
            "Starting TWAP daemon"
        );

        // 1. Start the run
        self.executor.start().await?;

        let mut poll = interval(self.config.runtime.status_poll);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut reconcile = self.config.runtime.reconcile_every.map(|period| {
            let mut reconcile = interval(period);
            reconcile.set_missed_tick_behavior(MissedTickBehavior::Delay);
            reconcile
        });

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        // 2. Main loop
        loop {
            tokio::select! {
                // Handle shutdown signals
                _ = &mut ctrl_c => {
                    info!("Received shutdown signal, stopping run");
                    self.executor.stop();
                    break;
                }

                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested, stopping run");
                    self.executor.stop();
                    break;
                }

                _ = poll.tick() => {
                    if !self.executor.is_active() {
                        info!("TWAP run completed");
                        break;
                    }
                }

                _ = next_tick(&mut reconcile) => {
                    if let Err(e) = self.executor.reconcile_pending().await {
                        warn!(error = %e, "Reconciliation sweep failed");
                    }
                }
            }
        }

        // 3. Orders still open at the venue
        if self.config.runtime.cancel_on_exit {
            match self.executor.cancel_open_orders().await {
                Ok(0) => {}
                Ok(cancelled) => info!(cancelled, "Cancelled open orders"),
                Err(e) => warn!(error = %e, "Failed to cancel open orders"),
            }
        }

        let summary = self.executor.summary();
        info!("Shutdown complete");

        Ok(summary)
    }
}

/// Tick of an optional interval; never resolves when disabled.
async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending::<()>().await,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use std::time::Duration;
    use twap_domain::StopReason;

    #[tokio::test(start_paused = true)]
    async fn test_stub_daemon_runs_to_completion() {
        let daemon = Daemon::new_stub(Config::test()).unwrap();

        let summary = daemon.run().await.unwrap().unwrap();

        assert_eq!(summary.total_orders, 12);
        assert_eq!(summary.executed_amount, dec!(999.99999996));
        assert_eq!(summary.stop_reason, Some(StopReason::DurationElapsed));
        assert!(!daemon.executor().is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_token_stops_run() {
        let daemon = Daemon::new_stub(Config::test()).unwrap();
        let shutdown = daemon.shutdown_token();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(650)).await;
            shutdown.cancel();
        });

        let summary = daemon.run().await.unwrap().unwrap();

        assert_eq!(summary.total_orders, 3);
        assert_eq!(summary.stop_reason, Some(StopReason::UserRequested));
    }

    #[test]
    fn test_new_venue_requires_credentials() {
        let mut config = Config::test();
        config.environment = Environment::Production;

        assert!(matches!(Daemon::new_venue(config), Err(DaemonError::Config(_))));
    }

    #[test]
    fn test_new_venue_with_credentials() {
        let mut config = Config::test();
        config.environment = Environment::Production;
        config.venue.url = Some("https://venue.example/api".to_string());
        config.venue.wallet_address = Some("0xabc".to_string());
        config.venue.wallet_secret = Some("secret".to_string());

        let daemon = Daemon::new_venue(config).unwrap();
        assert_eq!(daemon.executor().plan().number_of_orders, 12);
    }
}
