//! TwapExecutor: runs a TWAP program against an exchange port.
//!
//! The executor owns the run state and the timer. The pure `OrderPlan`
//! decides what each tick does; the executor performs the I/O and folds the
//! venue's answers back into the state.
//!
//! # Flow
//!
//! ```text
//! start() ─► timer task ─► tick ─► OrderPlan::decide ─► price ─► place_order ─► fold
//!                 ▲                                                             │
//!                 └──────────────────────── every interval ◄────────────────────┘
//! ```
//!
//! # Concurrency
//!
//! Ticks run one after another inside a single timer task, so they never
//! overlap. The run state sits behind a mutex that is never held across an
//! `.await`; `stop()` can therefore be called at any time. A response that
//! arrives after `stop()` is logged and dropped: the state of a stopped run
//! is frozen.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use twap_domain::{
    EngineStatus, OrderExecution, OrderSide, OrderStatus, OrderType, RunId, RunState, RunSummary,
    StopReason, TwapConfig,
};
use twap_engine::{OrderPlan, TickDecision};

use crate::error::{ExecError, ExecResult};
use crate::ports::{ExchangePort, OrderResponse};

// =============================================================================
// Shared state
// =============================================================================

/// Wall clock of a run, advanced by the monotonic (tokio) clock.
#[derive(Debug, Clone, Copy)]
struct RunClock {
    start_time: DateTime<Utc>,
    origin: Instant,
}

impl RunClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.origin.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.start_time + elapsed
    }
}

#[derive(Debug)]
struct Shared {
    status: EngineStatus,
    state: Option<RunState>,
    clock: Option<RunClock>,
    cancel: Option<CancellationToken>,
}

impl Shared {
    /// State of `run_id`, if that run is still the running one.
    fn running(&mut self, run_id: RunId) -> Option<&mut RunState> {
        if self.status != EngineStatus::Running {
            return None;
        }
        self.state.as_mut().filter(|state| state.run_id == run_id)
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.map(|clock| clock.now()).unwrap_or_else(Utc::now)
    }
}

/// What the timer loop should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Finished,
}

struct Inner<E: ExchangePort> {
    exchange: Arc<E>,
    config: TwapConfig,
    plan: OrderPlan,
    shared: Mutex<Shared>,
}

// =============================================================================
// Executor
// =============================================================================

/// Stateful TWAP engine.
///
/// Lifecycle: `Idle → Running → Stopped`, restartable from `Stopped`.
pub struct TwapExecutor<E: ExchangePort + 'static> {
    inner: Arc<Inner<E>>,
}

impl<E: ExchangePort + 'static> TwapExecutor<E> {
    /// Create an executor for a configuration.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or yields no orders.
    pub fn new(config: TwapConfig, exchange: Arc<E>) -> ExecResult<Self> {
        config.validate()?;
        let plan = OrderPlan::from_config(&config)?;

        Ok(Self {
            inner: Arc::new(Inner {
                exchange,
                config,
                plan,
                shared: Mutex::new(Shared {
                    status: EngineStatus::Idle,
                    state: None,
                    clock: None,
                    cancel: None,
                }),
            }),
        })
    }

    /// Begin a run.
    ///
    /// Returns as soon as the run is scheduled; the first order is placed
    /// right away by the timer task. No-op if a run is already in progress.
    pub async fn start(&self) -> ExecResult<()> {
        let duration = chrono::Duration::from_std(self.inner.config.duration())
            .map_err(|e| ExecError::Config(format!("Duration out of range: {}", e)))?;

        let (run_id, cancel) = {
            let mut shared = self.inner.lock();

            if shared.status == EngineStatus::Running {
                info!("TWAP run already in progress, ignoring start");
                return Ok(());
            }

            let start_time = Utc::now();
            let state = RunState::new(
                self.inner.config.pair.clone(),
                self.inner.config.total_amount,
                start_time,
                duration,
            );
            let run_id = state.run_id;
            let cancel = CancellationToken::new();

            info!(
                %run_id,
                pair = %self.inner.config.pair,
                total_amount = %self.inner.config.total_amount,
                number_of_orders = self.inner.plan.number_of_orders,
                nominal_size = %self.inner.plan.nominal_size,
                interval_secs = self.inner.config.interval_secs,
                end_time = %state.end_time,
                "Starting TWAP run"
            );

            shared.status = EngineStatus::Running;
            shared.state = Some(state);
            shared.clock = Some(RunClock { start_time, origin: Instant::now() });
            shared.cancel = Some(cancel.clone());

            (run_id, cancel)
        };

        let inner = self.inner.clone();
        tokio::spawn(async move {
            inner.run_timer(run_id, cancel).await;
        });

        Ok(())
    }

    /// Stop the current run. Idempotent.
    ///
    /// An order call already in flight is not aborted; its response will
    /// not be folded into the state.
    pub fn stop(&self) {
        let mut shared = self.inner.lock();

        if shared.status != EngineStatus::Running {
            debug!(status = %shared.status, "TWAP engine not running, ignoring stop");
            return;
        }

        info!("Stop requested");
        Inner::<E>::finish(&mut shared, StopReason::UserRequested);
    }

    /// Snapshot of the current (or last) run.
    pub fn state(&self) -> Option<RunState> {
        self.inner.lock().state.clone()
    }

    /// Summary of the current (or last) run.
    pub fn summary(&self) -> Option<RunSummary> {
        self.inner.lock().state.as_ref().map(RunState::summary)
    }

    /// Current lifecycle status.
    pub fn status(&self) -> EngineStatus {
        self.inner.lock().status
    }

    /// `true` iff a run is in progress.
    pub fn is_active(&self) -> bool {
        self.status() == EngineStatus::Running
    }

    /// The schedule derived from the configuration.
    pub fn plan(&self) -> &OrderPlan {
        &self.inner.plan
    }

    /// The configuration this executor was built with.
    pub fn config(&self) -> &TwapConfig {
        &self.inner.config
    }

    /// Refresh open orders of the running run from the venue.
    ///
    /// Queries every acknowledged order that is still `pending` or `partial`
    /// and folds only the difference between the venue's fill and what was
    /// already credited. Returns how many records changed.
    pub async fn reconcile_pending(&self) -> ExecResult<usize> {
        let (run_id, open) = {
            let mut shared = self.inner.lock();
            let status = shared.status;
            let state = shared
                .state
                .as_mut()
                .filter(|_| status == EngineStatus::Running)
                .ok_or_else(|| ExecError::InvalidState(format!("cannot reconcile while {}", status)))?;

            let open: Vec<(usize, String)> = state
                .orders
                .iter()
                .enumerate()
                .filter(|(_, order)| order.is_submitted() && order.status.is_open())
                .map(|(index, order)| (index, order.order_id.clone()))
                .collect();

            (state.run_id, open)
        };

        let mut updated = 0;

        for (index, order_id) in open {
            let response = match self.inner.exchange.get_order_status(&order_id).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(%run_id, %order_id, error = %e, "Order status query failed");
                    continue;
                }
            };

            let mut shared = self.inner.lock();
            let Some(state) = shared.running(run_id) else {
                info!(%run_id, "Run stopped during reconciliation");
                break;
            };

            if reconcile_order(state, index, &response) {
                updated += 1;
            }
        }

        if updated > 0 {
            info!(%run_id, updated, "Reconciled open orders");
        }

        Ok(updated)
    }

    /// Cancel orders of a stopped run that the venue may still fill.
    ///
    /// The frozen run state is left untouched. Returns how many cancel
    /// calls succeeded.
    pub async fn cancel_open_orders(&self) -> ExecResult<usize> {
        let open: Vec<String> = {
            let shared = self.inner.lock();

            if shared.status == EngineStatus::Running {
                return Err(ExecError::InvalidState(
                    "stop the run before cancelling its orders".to_string(),
                ));
            }

            shared
                .state
                .iter()
                .flat_map(|state| state.orders.iter())
                .filter(|order| order.is_submitted() && order.status.is_open())
                .map(|order| order.order_id.clone())
                .collect()
        };

        let mut cancelled = 0;
        for order_id in open {
            match self.inner.exchange.cancel_order(&order_id).await {
                Ok(()) => {
                    info!(%order_id, "Open order cancelled");
                    cancelled += 1;
                }
                Err(e) => warn!(%order_id, error = %e, "Failed to cancel order"),
            }
        }

        Ok(cancelled)
    }
}

impl<E: ExchangePort + 'static> Drop for TwapExecutor<E> {
    fn drop(&mut self) {
        if let Some(cancel) = &self.inner.lock().cancel {
            cancel.cancel();
        }
    }
}

impl<E: ExchangePort + 'static> Inner<E> {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Timer task: tick now, then every interval, until stopped.
    async fn run_timer(&self, run_id: RunId, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            if self.tick(run_id).await == Flow::Finished {
                break;
            }
        }

        debug!(%run_id, "TWAP timer stopped");
    }

    /// One execution step.
    async fn tick(&self, run_id: RunId) -> Flow {
        let pair = &self.config.pair;

        let (size, top_up, remaining) = {
            let mut shared = self.lock();
            let now = shared.now();
            let Some(state) = shared.running(run_id) else {
                return Flow::Finished;
            };

            match self.plan.decide(state, now) {
                TickDecision::Stop(reason) => {
                    Self::finish(&mut shared, reason);
                    return Flow::Finished;
                }
                TickDecision::Place { size, top_up } => (size, top_up, state.remaining_amount),
            }
        };

        if top_up {
            warn!(
                %run_id,
                %size,
                min_order_size = %self.plan.min_order_size,
                "Remaining amount below min order size, placing final top-up order"
            );
        }

        let market_price = match self.exchange.get_market_price(pair).await {
            Ok(price) => price,
            Err(e) => {
                error!(%run_id, %pair, error = %e, "Failed to fetch market price, skipping tick");
                return Flow::Continue;
            }
        };
        let limit_price = self.plan.limit_price(market_price);

        // Reconciliation may have credited fills while the price was fetched.
        let (index, size) = {
            let mut shared = self.lock();
            let now = shared.now();
            let Some(state) = shared.running(run_id) else {
                info!(%run_id, "Run stopped before order submission");
                return Flow::Finished;
            };

            let size = match self.plan.decide(state, now) {
                TickDecision::Stop(reason) => {
                    Self::finish(&mut shared, reason);
                    return Flow::Finished;
                }
                TickDecision::Place { size: current, .. } => size.min(current),
            };

            (state.push_order(OrderExecution::pending(size, limit_price, now)), size)
        };

        info!(
            %run_id,
            %pair,
            %size,
            %market_price,
            %limit_price,
            %remaining,
            "Placing TWAP order"
        );

        let result = self
            .exchange
            .place_order(pair, OrderSide::Buy, size, Some(limit_price), OrderType::Limit)
            .await;

        let mut shared = self.lock();
        let Some(state) = shared.running(run_id) else {
            match result {
                Ok(response) => warn!(
                    %run_id,
                    order_id = %response.order_id,
                    status = %response.status,
                    "Order response arrived after stop, not folded"
                ),
                Err(e) => warn!(%run_id, error = %e, "Order failed after stop"),
            }
            return Flow::Finished;
        };

        match result {
            Ok(response) => {
                let credited = fold_placement(state, index, &response);
                info!(
                    %run_id,
                    order_id = %response.order_id,
                    status = %response.status,
                    %credited,
                    executed = %state.executed_amount,
                    remaining = %state.remaining_amount,
                    average_price = ?state.average_execution_price,
                    "TWAP order placed"
                );
            }
            Err(e) => {
                error!(%run_id, %size, %limit_price, error = %e, "Failed to place TWAP order");
            }
        }

        Flow::Continue
    }

    /// Transition to `Stopped` and report.
    fn finish(shared: &mut Shared, reason: StopReason) {
        shared.status = EngineStatus::Stopped;

        if let Some(cancel) = shared.cancel.take() {
            cancel.cancel();
        }

        if let Some(state) = shared.state.as_mut() {
            state.stop_reason = Some(reason);
            log_summary(&state.summary());
        }
    }
}

// =============================================================================
// Folding
// =============================================================================

/// Apply a placement response to the record at `index`.
///
/// Without a reported fill the requested size is assumed filled, whatever
/// the status; reconciliation corrects it later. Returns the credited amount.
fn fold_placement(state: &mut RunState, index: usize, response: &OrderResponse) -> Decimal {
    let Some(order) = state.orders.get_mut(index) else {
        return Decimal::ZERO;
    };

    let credit = response.filled_size.unwrap_or(order.size);

    order.order_id = response.order_id.clone();
    order.status = response.status;
    order.filled_size = response.filled_size;
    order.average_price = response.average_price;

    state.credit(index, credit);
    state.recompute_average();
    credit
}

/// Apply a status query response. Returns whether anything changed.
fn reconcile_order(state: &mut RunState, index: usize, response: &OrderResponse) -> bool {
    let Some(order) = state.orders.get_mut(index) else {
        return false;
    };

    let target = match (response.filled_size, response.status) {
        (Some(filled), _) => filled,
        (None, OrderStatus::Filled) => order.size,
        (None, OrderStatus::Failed) => Decimal::ZERO,
        (None, _) => order.credited_amount,
    };
    let delta = target - order.credited_amount;

    let changed = delta != Decimal::ZERO
        || order.status != response.status
        || order.filled_size != response.filled_size
        || order.average_price != response.average_price;

    if !changed {
        return false;
    }

    debug!(
        order_id = %order.order_id,
        from = %order.status,
        to = %response.status,
        %delta,
        "Order updated by reconciliation"
    );

    order.status = response.status;
    order.filled_size = response.filled_size;
    order.average_price = response.average_price;

    state.credit(index, delta);
    state.recompute_average();
    true
}

fn log_summary(summary: &RunSummary) {
    info!(
        run_id = %summary.run_id,
        pair = %summary.pair,
        reason = ?summary.stop_reason,
        total_orders = summary.total_orders,
        filled_orders = summary.filled_orders,
        partial_orders = summary.partial_orders,
        pending_orders = summary.pending_orders,
        failed_orders = summary.failed_orders,
        executed = %summary.executed_amount,
        remaining = %summary.remaining_amount,
        total = %summary.total_amount,
        "TWAP run stopped"
    );

    match summary.average_execution_price {
        Some(price) => info!(run_id = %summary.run_id, average_price = %price, "Average execution price"),
        None => info!(run_id = %summary.run_id, "No orders filled"),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::{FillMode, StubExchange};
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use twap_domain::TradingPair;

    fn config(total: Decimal, duration: u64, interval: u64, min: Decimal, max: Decimal) -> TwapConfig {
        TwapConfig::new(
            TradingPair::parse("ETH/USDC").unwrap(),
            total,
            duration,
            interval,
            dec!(0.01),
            min,
            max,
        )
        .unwrap()
    }

    fn reference_config() -> TwapConfig {
        config(dec!(1000), 3600, 300, dec!(10), dec!(100))
    }

    fn setup(config: TwapConfig) -> (TwapExecutor<StubExchange>, Arc<StubExchange>) {
        let exchange = Arc::new(StubExchange::new(dec!(1.00)));
        let executor = TwapExecutor::new(config, exchange.clone()).unwrap();
        (executor, exchange)
    }

    /// Let the timer task run its pending tick.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    async fn advance(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_runs_immediately() {
        let (executor, exchange) = setup(reference_config());
        assert_eq!(executor.status(), EngineStatus::Idle);
        assert!(executor.state().is_none());

        executor.start().await.unwrap();
        assert!(executor.is_active());
        settle().await;

        let state = executor.state().unwrap();
        assert_eq!(state.orders.len(), 1);

        let order = &state.orders[0];
        assert_eq!(order.size, dec!(83.33333333));
        assert_eq!(order.limit_price, dec!(1.01));
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.order_id, "STUB-1");
        assert_eq!(state.executed_amount, dec!(83.33333333));
        assert_eq!(state.remaining_amount, dec!(916.66666667));
        assert_eq!(state.average_execution_price, Some(dec!(1.00)));

        let submitted = exchange.submitted_orders();
        assert_eq!(submitted[0].side, OrderSide::Buy);
        assert_eq!(submitted[0].order_type, OrderType::Limit);
        assert_eq!(submitted[0].price, Some(dec!(1.01)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_follow_interval() {
        let (executor, _) = setup(reference_config());
        executor.start().await.unwrap();
        settle().await;

        advance(299).await;
        assert_eq!(executor.state().unwrap().orders.len(), 1);

        advance(1).await;
        settle().await;
        assert_eq!(executor.state().unwrap().orders.len(), 2);

        advance(300).await;
        settle().await;
        let state = executor.state().unwrap();
        assert_eq!(state.orders.len(), 3);
        assert!(state.is_balanced());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_completes_when_amount_exhausted() {
        let (executor, exchange) = setup(config(dec!(100), 1200, 300, dec!(10), dec!(100)));
        executor.start().await.unwrap();
        settle().await;

        // four orders at 0/300/600/900, stop check at 1200
        advance(1200).await;
        settle().await;

        assert!(!executor.is_active());
        let state = executor.state().unwrap();
        assert_eq!(state.orders.len(), 4);
        assert_eq!(state.executed_amount, dec!(100));
        assert_eq!(state.remaining_amount, Decimal::ZERO);
        assert_eq!(state.stop_reason, Some(StopReason::AmountExhausted));
        assert_eq!(exchange.submitted_orders().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_when_duration_elapses() {
        let (executor, exchange) = setup(config(dec!(1000), 600, 300, dec!(10), dec!(100)));
        exchange.set_fill_mode(FillMode::Rejected);

        executor.start().await.unwrap();
        settle().await;
        advance(600).await;
        settle().await;

        let state = executor.state().unwrap();
        assert_eq!(executor.status(), EngineStatus::Stopped);
        assert_eq!(state.stop_reason, Some(StopReason::DurationElapsed));
        assert_eq!(state.orders.len(), 2);
        assert!(state.orders.iter().all(|o| o.status == OrderStatus::Failed));
        assert_eq!(state.remaining_amount, dec!(833.33333334));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_status_without_fill_is_credited_optimistically() {
        let (executor, exchange) = setup(reference_config());
        exchange.set_fill_mode(FillMode::Rejected);

        executor.start().await.unwrap();
        settle().await;

        let state = executor.state().unwrap();
        let order = &state.orders[0];
        assert_eq!(order.status, OrderStatus::Failed);
        assert_eq!(order.filled_size, None);
        assert_eq!(order.credited_amount, dec!(83.33333333));
        assert_eq!(state.executed_amount, dec!(83.33333333));
        assert_eq!(state.remaining_amount, dec!(916.66666667));
        // only filled records carry the average
        assert_eq!(state.average_execution_price, None);
        assert!(state.is_balanced());
    }

    #[tokio::test(start_paused = true)]
    async fn test_small_total_places_single_top_up() {
        let (executor, exchange) = setup(config(dec!(5), 3600, 300, dec!(10), dec!(100)));
        assert_eq!(executor.plan().nominal_size, dec!(10));

        executor.start().await.unwrap();
        settle().await;
        advance(300).await;
        settle().await;

        let submitted = exchange.submitted_orders();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].size, dec!(5));

        let state = executor.state().unwrap();
        assert_eq!(state.stop_reason, Some(StopReason::AmountExhausted));
        assert!(!executor.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_freezes_state() {
        let (executor, exchange) = setup(reference_config());
        executor.start().await.unwrap();
        settle().await;

        executor.stop();
        executor.stop();
        assert_eq!(executor.status(), EngineStatus::Stopped);

        advance(900).await;
        let state = executor.state().unwrap();
        assert_eq!(state.orders.len(), 1);
        assert_eq!(state.stop_reason, Some(StopReason::UserRequested));
        assert_eq!(exchange.submitted_orders().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_running_is_noop() {
        let (executor, _) = setup(reference_config());
        executor.start().await.unwrap();
        settle().await;
        let run_id = executor.state().unwrap().run_id;

        executor.start().await.unwrap();
        settle().await;

        let state = executor.state().unwrap();
        assert_eq!(state.run_id, run_id);
        assert_eq!(state.orders.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_state() {
        let (executor, _) = setup(reference_config());
        executor.start().await.unwrap();
        settle().await;
        advance(300).await;
        settle().await;
        executor.stop();
        let first = executor.state().unwrap();
        assert_eq!(first.orders.len(), 2);

        executor.start().await.unwrap();
        settle().await;

        let second = executor.state().unwrap();
        assert_ne!(second.run_id, first.run_id);
        assert_eq!(second.orders.len(), 1);
        assert_eq!(second.executed_amount, dec!(83.33333333));
        assert_eq!(second.stop_reason, None);
        assert!(executor.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_price_failure_skips_tick() {
        let (executor, exchange) = setup(reference_config());
        exchange.fail_next_price(ExecError::Venue { status: 503, message: "down".into() });

        executor.start().await.unwrap();
        settle().await;
        assert!(executor.state().unwrap().orders.is_empty());
        assert!(executor.is_active());

        advance(300).await;
        settle().await;
        assert_eq!(executor.state().unwrap().orders.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_failure_keeps_pending_record() {
        let (executor, exchange) = setup(reference_config());
        exchange.fail_next_order(ExecError::Venue { status: 400, message: "insufficient balance".into() });

        executor.start().await.unwrap();
        settle().await;

        let state = executor.state().unwrap();
        assert_eq!(state.orders.len(), 1);
        assert_eq!(state.orders[0].status, OrderStatus::Pending);
        assert!(state.orders[0].order_id.is_empty());
        assert_eq!(state.executed_amount, Decimal::ZERO);
        assert!(executor.is_active());

        advance(300).await;
        settle().await;
        let state = executor.state().unwrap();
        assert_eq!(state.orders.len(), 2);
        assert_eq!(state.orders[1].status, OrderStatus::Filled);
        assert_eq!(state.executed_amount, dec!(83.33333333));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_fill_is_credited_optimistically() {
        let (executor, exchange) = setup(reference_config());
        exchange.set_fill_mode(FillMode::Unreported);

        executor.start().await.unwrap();
        settle().await;

        let state = executor.state().unwrap();
        assert_eq!(state.orders[0].status, OrderStatus::Pending);
        assert_eq!(state.orders[0].filled_size, None);
        assert_eq!(state.orders[0].credited_amount, dec!(83.33333333));
        assert_eq!(state.executed_amount, dec!(83.33333333));
        // pending orders never count towards the average
        assert_eq!(state.average_execution_price, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_fills_keep_accounting_balanced() {
        let (executor, exchange) = setup(reference_config());
        exchange.set_fill_mode(FillMode::Partial(dec!(0.5)));

        executor.start().await.unwrap();
        settle().await;

        for _ in 0..3 {
            let state = executor.state().unwrap();
            assert!(state.is_balanced());
            advance(300).await;
            settle().await;
        }

        let state = executor.state().unwrap();
        assert_eq!(state.orders.len(), 4);
        assert!(state.orders.iter().all(|o| o.status == OrderStatus::Partial));
        assert_eq!(state.executed_amount, dec!(166.66666664));
        assert!(state.is_balanced());
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_after_stop_is_not_folded() {
        let (executor, exchange) = setup(reference_config());
        exchange.set_order_latency(Duration::from_secs(10));

        executor.start().await.unwrap();
        settle().await;

        // order call in flight
        executor.stop();
        advance(20).await;

        let state = executor.state().unwrap();
        assert_eq!(state.orders.len(), 1);
        assert!(state.orders[0].order_id.is_empty());
        assert_eq!(state.orders[0].status, OrderStatus::Pending);
        assert_eq!(state.executed_amount, Decimal::ZERO);
        assert_eq!(exchange.submitted_orders().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_tick_delays_next_one() {
        let (executor, exchange) = setup(reference_config());
        exchange.set_order_latency(Duration::from_secs(400));

        executor.start().await.unwrap();
        settle().await;

        advance(350).await;
        assert_eq!(exchange.submitted_orders().len(), 0);

        // first order lands at t=400, second tick starts right after
        advance(100).await;
        settle().await;
        let state = executor.state().unwrap();
        assert_eq!(state.orders.len(), 2);
        assert_eq!(state.orders[0].status, OrderStatus::Filled);
        assert_eq!(exchange.submitted_orders().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_credits_only_the_difference() {
        let (executor, exchange) = setup(reference_config());
        exchange.set_fill_mode(FillMode::Unreported);

        executor.start().await.unwrap();
        settle().await;
        let order_id = executor.state().unwrap().orders[0].order_id.clone();

        // nothing new at the venue
        assert_eq!(executor.reconcile_pending().await.unwrap(), 0);

        exchange.set_order_status(OrderResponse {
            order_id: order_id.clone(),
            status: OrderStatus::Filled,
            filled_size: Some(dec!(80)),
            average_price: Some(dec!(1.005)),
        });

        assert_eq!(executor.reconcile_pending().await.unwrap(), 1);

        let state = executor.state().unwrap();
        assert_eq!(state.orders[0].status, OrderStatus::Filled);
        assert_eq!(state.orders[0].credited_amount, dec!(80));
        assert_eq!(state.executed_amount, dec!(80));
        assert_eq!(state.remaining_amount, dec!(920));
        assert_eq!(state.average_execution_price, Some(dec!(1.005)));

        // filled orders are no longer queried
        assert_eq!(executor.reconcile_pending().await.unwrap(), 0);
    }

    fn filled(order_id: &str, size: Decimal) -> OrderResponse {
        OrderResponse {
            order_id: order_id.to_string(),
            status: OrderStatus::Filled,
            filled_size: Some(size),
            average_price: Some(dec!(1.00)),
        }
    }

    /// Two partially filled orders, third tick waiting on a slow price.
    async fn third_tick_in_flight() -> (TwapExecutor<StubExchange>, Arc<StubExchange>) {
        let (executor, exchange) = setup(config(dec!(20), 900, 300, dec!(1), dec!(100)));
        exchange.set_fill_mode(FillMode::Partial(dec!(0.2)));

        executor.start().await.unwrap();
        settle().await;
        advance(300).await;
        settle().await;
        assert_eq!(executor.state().unwrap().orders.len(), 2);

        exchange.set_price_latency(Duration::from_secs(10));
        advance(300).await;
        settle().await;
        assert_eq!(executor.state().unwrap().orders.len(), 2);

        (executor, exchange)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fills_reconciled_during_price_fetch_stop_the_run() {
        let (executor, exchange) = third_tick_in_flight().await;

        exchange.set_order_status(filled("STUB-1", dec!(10)));
        exchange.set_order_status(filled("STUB-2", dec!(10)));
        assert_eq!(executor.reconcile_pending().await.unwrap(), 2);
        assert_eq!(executor.state().unwrap().remaining_amount, Decimal::ZERO);

        advance(10).await;
        settle().await;

        let state = executor.state().unwrap();
        assert_eq!(exchange.submitted_orders().len(), 2);
        assert_eq!(state.orders.len(), 2);
        assert_eq!(state.executed_amount, dec!(20));
        assert_eq!(state.remaining_amount, Decimal::ZERO);
        assert_eq!(state.stop_reason, Some(StopReason::AmountExhausted));
        assert!(!executor.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fills_reconciled_during_price_fetch_shrink_the_order() {
        let (executor, exchange) = third_tick_in_flight().await;

        exchange.set_order_status(filled("STUB-1", dec!(10)));
        exchange.set_order_status(filled("STUB-2", dec!(6.66666666)));
        executor.reconcile_pending().await.unwrap();
        assert_eq!(executor.state().unwrap().remaining_amount, dec!(3.33333334));

        advance(10).await;
        settle().await;

        let submitted = exchange.submitted_orders();
        assert_eq!(submitted.len(), 3);
        assert_eq!(submitted[2].size, dec!(3.33333334));

        let state = executor.state().unwrap();
        assert_eq!(state.orders[2].size, dec!(3.33333334));
        assert!(state.remaining_amount >= Decimal::ZERO);
        assert!(state.is_balanced());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_requires_running() {
        let (executor, _) = setup(reference_config());
        assert!(matches!(
            executor.reconcile_pending().await,
            Err(ExecError::InvalidState(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_open_orders_after_stop() {
        let (executor, exchange) = setup(reference_config());
        exchange.set_fill_mode(FillMode::Unreported);

        executor.start().await.unwrap();
        settle().await;

        assert!(executor.cancel_open_orders().await.is_err());

        executor.stop();
        let frozen = executor.state().unwrap();

        assert_eq!(executor.cancel_open_orders().await.unwrap(), 1);
        assert_eq!(exchange.cancelled_orders(), vec!["STUB-1".to_string()]);
        assert_eq!(executor.state().unwrap(), frozen);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = reference_config();
        config.interval_secs = 7200;

        let exchange = Arc::new(StubExchange::new(dec!(1)));
        assert!(matches!(
            TwapExecutor::new(config, exchange),
            Err(ExecError::Domain(_))
        ));
    }
}
