//! Order planning: how many child orders, how big, at what price.
//!
//! Everything here is a pure function of the configuration (and, for the
//! per-tick decision, of the current run state and clock).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::warn;

use twap_domain::{to_fixed, truncate_fixed, RunState, StopReason, TwapConfig};

use crate::error::{EngineError, EngineResult};

/// Remaining amounts below this are not worth an order.
pub const NEGLIGIBLE_REMAINDER: Decimal = dec!(0.0001);

// =============================================================================
// Order Plan
// =============================================================================

/// How the raw per-order size was adjusted to fit the configured bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SizeClamp {
    /// Raw size was within `[min, max]`
    Unchanged,
    /// Raw size was below `min_order_size`
    RaisedToMin,
    /// Raw size was above `max_order_size`
    LoweredToMax,
}

/// Static schedule derived once per configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderPlan {
    /// `floor(duration / interval)`
    pub number_of_orders: u64,
    /// `total_amount / number_of_orders`
    pub raw_size: Decimal,
    /// Raw size clamped to `[min_order_size, max_order_size]`
    pub nominal_size: Decimal,
    /// Which clamp (if any) was applied
    pub clamp: SizeClamp,
    /// Copied from the config; decides top-up orders
    pub min_order_size: Decimal,
    /// Copied from the config; used for the limit price
    pub slippage_tolerance: Decimal,
}

impl OrderPlan {
    /// Derive the plan for a configuration.
    ///
    /// # Errors
    ///
    /// `EngineError::NoOrders` if the interval is longer than the duration.
    /// A validated `TwapConfig` never triggers it.
    pub fn from_config(config: &TwapConfig) -> EngineResult<Self> {
        let number_of_orders = config
            .duration_secs
            .checked_div(config.interval_secs)
            .unwrap_or(0);

        if number_of_orders == 0 {
            return Err(EngineError::NoOrders {
                duration_secs: config.duration_secs,
                interval_secs: config.interval_secs,
            });
        }

        let raw_size = config.total_amount / Decimal::from(number_of_orders);

        let (nominal_size, clamp) = if raw_size < config.min_order_size {
            warn!(
                raw_size = %raw_size,
                min_order_size = %config.min_order_size,
                "Order size below minimum, using min_order_size"
            );
            (config.min_order_size, SizeClamp::RaisedToMin)
        } else if raw_size > config.max_order_size {
            warn!(
                raw_size = %raw_size,
                max_order_size = %config.max_order_size,
                "Order size above maximum, using max_order_size"
            );
            (config.max_order_size, SizeClamp::LoweredToMax)
        } else {
            (raw_size, SizeClamp::Unchanged)
        };

        Ok(Self {
            number_of_orders,
            raw_size,
            nominal_size,
            clamp,
            min_order_size: config.min_order_size,
            slippage_tolerance: config.slippage_tolerance,
        })
    }

    /// Worst acceptable buy price for a given market price.
    pub fn limit_price(&self, market_price: Decimal) -> Decimal {
        limit_price(market_price, self.slippage_tolerance)
    }

    /// Decide what the next tick should do.
    pub fn decide(&self, state: &RunState, now: DateTime<Utc>) -> TickDecision {
        let remaining = state.remaining_amount;

        if remaining <= Decimal::ZERO {
            return TickDecision::Stop(StopReason::AmountExhausted);
        }

        if now >= state.end_time {
            return TickDecision::Stop(StopReason::DurationElapsed);
        }

        if remaining < NEGLIGIBLE_REMAINDER {
            return TickDecision::Stop(StopReason::NegligibleRemainder);
        }

        let size = truncate_fixed(self.nominal_size.min(remaining));

        TickDecision::Place {
            size,
            top_up: size < self.min_order_size,
        }
    }
}

/// `market_price * (1 + slippage)`, fixed to 8 fractional digits.
pub fn limit_price(market_price: Decimal, slippage_tolerance: Decimal) -> Decimal {
    to_fixed(market_price * (Decimal::ONE + slippage_tolerance))
}

// =============================================================================
// Tick Decision
// =============================================================================

/// Outcome of [`OrderPlan::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    /// Submit an order of `size`
    Place {
        /// Size to submit, fixed to 8 fractional digits
        size: Decimal,
        /// Below `min_order_size`: final order for what is left
        top_up: bool,
    },
    /// End the run
    Stop(StopReason),
}

// =============================================================================
// Tests
// =============================================================================
