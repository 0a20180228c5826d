//! Domain Entities for the TWAP program
//!
//! `RunState` is the single mutable aggregate of a run. It is owned by the
//! executor and handed out to readers only as a cloned snapshot.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::value_objects::{to_fixed, DomainError, TradingPair};

/// Unique identifier for a run
pub type RunId = Uuid;

// =============================================================================
// Engine status
// =============================================================================

/// Lifecycle of the TWAP engine
///
/// ```text
/// Idle ──start()──► Running ──stop() / completion──► Stopped
///                      ▲                                │
///                      └────────────start()─────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineStatus {
    /// Never started
    Idle,
    /// A run is in progress
    Running,
    /// The last run finished; state is frozen
    Stopped,
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineStatus::Idle => write!(f, "idle"),
            EngineStatus::Running => write!(f, "running"),
            EngineStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Remaining amount reached zero
    AmountExhausted,
    /// The configured duration elapsed
    DurationElapsed,
    /// Remaining amount too small to be worth an order
    NegligibleRemainder,
    /// `stop()` was called
    UserRequested,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::AmountExhausted => write!(f, "amount_exhausted"),
            StopReason::DurationElapsed => write!(f, "duration_elapsed"),
            StopReason::NegligibleRemainder => write!(f, "negligible_remainder"),
            StopReason::UserRequested => write!(f, "user_requested"),
        }
    }
}

// =============================================================================
// Order Execution
// =============================================================================

/// Status of a submitted child order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Created locally or acknowledged without a fill
    Pending,
    /// Completely filled
    Filled,
    /// Partially filled
    Partial,
    /// Rejected, cancelled or otherwise dead at the venue
    Failed,
}

impl OrderStatus {
    /// Whether the venue may still fill (more of) this order
    pub fn is_open(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Partial)
    }

    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Filled => "filled",
            OrderStatus::Partial => "partial",
            OrderStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "filled" => Ok(OrderStatus::Filled),
            "partial" => Ok(OrderStatus::Partial),
            "failed" => Ok(OrderStatus::Failed),
            other => Err(DomainError::InvalidOrderStatus(other.to_string())),
        }
    }
}

/// One child order of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderExecution {
    /// Venue order id, empty until the placement response arrives
    pub order_id: String,
    /// When the record was created
    pub submitted_at: DateTime<Utc>,
    /// Requested size
    pub size: Decimal,
    /// Requested limit price
    pub limit_price: Decimal,
    /// Last known status
    pub status: OrderStatus,
    /// Size the venue reported as filled
    pub filled_size: Option<Decimal>,
    /// Average fill price reported by the venue
    pub average_price: Option<Decimal>,
    /// Amount of this order already counted in `RunState::executed_amount`
    pub credited_amount: Decimal,
}

impl OrderExecution {
    /// New record for an order about to be submitted
    pub fn pending(size: Decimal, limit_price: Decimal, submitted_at: DateTime<Utc>) -> Self {
        Self {
            order_id: String::new(),
            submitted_at,
            size,
            limit_price,
            status: OrderStatus::Pending,
            filled_size: None,
            average_price: None,
            credited_amount: Decimal::ZERO,
        }
    }

    /// Whether the venue has acknowledged the order
    pub fn is_submitted(&self) -> bool {
        !self.order_id.is_empty()
    }
}

// =============================================================================
// Run State
// =============================================================================

/// Mutable state of one TWAP run
///
/// # Invariants
/// - `executed_amount + remaining_amount == total_amount`
/// - `orders` is append-only, in submission order
/// - `average_execution_price` only reflects `Filled` records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    /// Identifier used to correlate logs of this run
    pub run_id: RunId,
    /// Market being bought on
    pub pair: TradingPair,
    /// Target amount
    pub total_amount: Decimal,
    /// Amount still to buy
    pub remaining_amount: Decimal,
    /// Amount bought so far
    pub executed_amount: Decimal,
    /// Child orders, oldest first
    pub orders: Vec<OrderExecution>,
    /// Run start (wall clock)
    pub start_time: DateTime<Utc>,
    /// `start_time + duration`
    pub end_time: DateTime<Utc>,
    /// Size-weighted mean fill price over filled orders
    pub average_execution_price: Option<Decimal>,
    /// Set once the run has stopped
    pub stop_reason: Option<StopReason>,
}

impl RunState {
    /// Fresh state for a run starting at `start_time`
    pub fn new(
        pair: TradingPair,
        total_amount: Decimal,
        start_time: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            pair,
            total_amount,
            remaining_amount: total_amount,
            executed_amount: Decimal::ZERO,
            orders: Vec::new(),
            start_time,
            end_time: start_time + duration,
            average_execution_price: None,
            stop_reason: None,
        }
    }

    /// Append a record, returning its index
    pub fn push_order(&mut self, order: OrderExecution) -> usize {
        self.orders.push(order);
        self.orders.len() - 1
    }

    /// Fold `amount` of fill for the order at `index` into the totals.
    ///
    /// Negative amounts (a venue revising a fill down) are accepted so that
    /// reconciliation can correct optimistic credits.
    pub fn credit(&mut self, index: usize, amount: Decimal) {
        let amount = to_fixed(amount);
        if amount.is_zero() {
            return;
        }

        if let Some(order) = self.orders.get_mut(index) {
            order.credited_amount += amount;
            self.executed_amount += amount;
            self.remaining_amount = self.total_amount - self.executed_amount;
        }
    }

    /// Recompute the size-weighted average price over filled orders
    pub fn recompute_average(&mut self) {
        let (notional, volume) = self
            .orders
            .iter()
            .filter(|o| o.status == OrderStatus::Filled)
            .filter_map(|o| {
                let price = o.average_price?;
                let size = o.filled_size.unwrap_or(o.size);
                Some((price * size, size))
            })
            .fold((Decimal::ZERO, Decimal::ZERO), |(n, v), (pn, s)| (n + pn, v + s));

        self.average_execution_price = if volume > Decimal::ZERO {
            Some(to_fixed(notional / volume))
        } else {
            None
        };
    }

    /// Check the accounting invariant
    pub fn is_balanced(&self) -> bool {
        self.executed_amount + self.remaining_amount == self.total_amount
    }

    /// Aggregate view used for the end-of-run report
    pub fn summary(&self) -> RunSummary {
        let count = |status: OrderStatus| self.orders.iter().filter(|o| o.status == status).count();

        RunSummary {
            run_id: self.run_id,
            pair: self.pair.clone(),
            total_orders: self.orders.len(),
            filled_orders: count(OrderStatus::Filled),
            partial_orders: count(OrderStatus::Partial),
            pending_orders: count(OrderStatus::Pending),
            failed_orders: count(OrderStatus::Failed),
            total_amount: self.total_amount,
            executed_amount: self.executed_amount,
            remaining_amount: self.remaining_amount,
            average_execution_price: self.average_execution_price,
            stop_reason: self.stop_reason,
        }
    }
}

/// End-of-run report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run identifier
    pub run_id: RunId,
    /// Market
    pub pair: TradingPair,
    /// Number of child orders created
    pub total_orders: usize,
    /// Orders reported filled
    pub filled_orders: usize,
    /// Orders reported partially filled
    pub partial_orders: usize,
    /// Orders without a fill report
    pub pending_orders: usize,
    /// Orders reported failed
    pub failed_orders: usize,
    /// Target amount
    pub total_amount: Decimal,
    /// Amount bought
    pub executed_amount: Decimal,
    /// Amount not bought
    pub remaining_amount: Decimal,
    /// Average fill price, if anything filled
    pub average_execution_price: Option<Decimal>,
    /// Why the run ended
    pub stop_reason: Option<StopReason>,
}

// =============================================================================
// Tests
// =============================================================================
