//! E2E test: daemon host loop with reconciliation and exit cancellation.
//!
//! Flow:
//! 1. Load a program from an env-style lookup (test environment)
//! 2. Venue acknowledges orders without fills
//! 3. First order later reported filled at a smaller size; the sweep corrects it
//! 4. Shutdown mid-run: orders still open are cancelled, state stays frozen

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use twap_domain::{OrderStatus, StopReason};
use twap_exec::{FillMode, OrderResponse, StubExchange};
use twapd::{Config, Daemon};

fn config() -> Config {
    let vars: HashMap<&str, &str> = [
        ("TWAP_ENV", "test"),
        ("TWAP_PAIR", "ETH/USDC"),
        ("TWAP_TOTAL_AMOUNT", "1000"),
        ("TWAP_DURATION_SECS", "3600"),
        ("TWAP_INTERVAL_SECS", "300"),
        ("TWAP_STATUS_POLL_SECS", "1"),
        ("TWAP_RECONCILE_SECS", "60"),
    ]
    .into_iter()
    .collect();

    Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_reconcile_and_cancel_on_exit() {
    let exchange = Arc::new(StubExchange::new(dec!(1.00)));
    exchange.set_fill_mode(FillMode::Unreported);

    let daemon = Daemon::new(config(), exchange.clone()).unwrap();
    let shutdown = daemon.shutdown_token();

    let venue = exchange.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        venue.set_order_status(OrderResponse {
            order_id: "STUB-1".to_string(),
            status: OrderStatus::Filled,
            filled_size: Some(dec!(50)),
            average_price: Some(dec!(1.00)),
        });

        tokio::time::sleep(Duration::from_secs(640)).await;
        shutdown.cancel();
    });

    let summary = daemon.run().await.unwrap().unwrap();

    assert_eq!(summary.total_orders, 3);
    assert_eq!(summary.filled_orders, 1);
    assert_eq!(summary.pending_orders, 2);
    assert_eq!(summary.stop_reason, Some(StopReason::UserRequested));
    assert_eq!(summary.executed_amount, dec!(216.66666666));
    assert_eq!(summary.remaining_amount, dec!(783.33333334));
    assert_eq!(summary.average_execution_price, Some(dec!(1.00)));

    let mut cancelled = exchange.cancelled_orders();
    cancelled.sort();
    assert_eq!(cancelled, vec!["STUB-2".to_string(), "STUB-3".to_string()]);

    let state = daemon.executor().state().unwrap();
    assert!(state.is_balanced());
    assert_eq!(state.orders[1].status, OrderStatus::Pending);
}

#[tokio::test(start_paused = true)]
async fn test_completed_run_cancels_nothing() {
    let exchange = Arc::new(StubExchange::new(dec!(1.00)));
    let daemon = Daemon::new(config(), exchange.clone()).unwrap();

    let summary = daemon.run().await.unwrap().unwrap();

    assert_eq!(summary.total_orders, 12);
    assert_eq!(summary.filled_orders, 12);
    assert_eq!(summary.stop_reason, Some(StopReason::DurationElapsed));
    assert!(exchange.cancelled_orders().is_empty());
}
