//! TWAP program configuration
//!
//! A `TwapConfig` is validated exactly once, when it is built. Everything
//! downstream trusts it.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::value_objects::{DomainError, TradingPair};

/// Immutable description of one TWAP buy program.
///
/// # Invariants
/// - `total_amount > 0`
/// - `duration_secs > 0`
/// - `0 < interval_secs <= duration_secs`
/// - `0 <= slippage_tolerance <= 1`
/// - `0 < min_order_size <= max_order_size`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwapConfig {
    /// Market to buy on
    pub pair: TradingPair,
    /// Total amount of the base asset to acquire
    pub total_amount: Decimal,
    /// Length of the program in seconds
    pub duration_secs: u64,
    /// Seconds between two consecutive orders
    pub interval_secs: u64,
    /// Fraction added to the market price to get the limit price (0.01 = 1%)
    pub slippage_tolerance: Decimal,
    /// Smallest regular order size
    pub min_order_size: Decimal,
    /// Largest order size
    pub max_order_size: Decimal,
}

impl TwapConfig {
    /// Build and validate a configuration
    ///
    /// # Errors
    /// Returns `DomainError::InvalidConfig` if any invariant is violated
    pub fn new(
        pair: TradingPair,
        total_amount: Decimal,
        duration_secs: u64,
        interval_secs: u64,
        slippage_tolerance: Decimal,
        min_order_size: Decimal,
        max_order_size: Decimal,
    ) -> Result<Self, DomainError> {
        let config = Self {
            pair,
            total_amount,
            duration_secs,
            interval_secs,
            slippage_tolerance,
            min_order_size,
            max_order_size,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every invariant
    ///
    /// Needed for configurations that were deserialized rather than built
    /// with [`TwapConfig::new`].
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.total_amount <= Decimal::ZERO {
            return Err(DomainError::InvalidConfig(format!(
                "total amount must be positive, got {}",
                self.total_amount
            )));
        }

        if self.duration_secs == 0 {
            return Err(DomainError::InvalidConfig("duration must be positive".to_string()));
        }

        if self.interval_secs == 0 {
            return Err(DomainError::InvalidConfig("interval must be positive".to_string()));
        }

        if self.interval_secs > self.duration_secs {
            return Err(DomainError::InvalidConfig(format!(
                "interval ({}s) cannot exceed duration ({}s)",
                self.interval_secs, self.duration_secs
            )));
        }

        if self.slippage_tolerance < Decimal::ZERO || self.slippage_tolerance > Decimal::ONE {
            return Err(DomainError::InvalidConfig(format!(
                "slippage tolerance must be within [0, 1], got {}",
                self.slippage_tolerance
            )));
        }

        if self.min_order_size <= Decimal::ZERO {
            return Err(DomainError::InvalidConfig(format!(
                "min order size must be positive, got {}",
                self.min_order_size
            )));
        }

        if self.min_order_size > self.max_order_size {
            return Err(DomainError::InvalidConfig(format!(
                "min order size ({}) cannot exceed max order size ({})",
                self.min_order_size, self.max_order_size
            )));
        }

        Ok(())
    }

    /// Program length
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    /// Time between ticks
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// =============================================================================
// Tests
// =============================================================================
