//! Value Objects for the TWAP domain
//!
//! Immutable, validated domain primitives.
//! All value objects enforce invariants at construction time.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Domain errors for value object and configuration validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Trading pair must be BASE/QUOTE
    #[error("Invalid trading pair: {0}")]
    InvalidPair(String),

    /// Decimal string could not be parsed
    #[error("Invalid decimal value for {field}: {value}")]
    InvalidDecimal {
        /// Name of the field being parsed
        field: String,
        /// Raw input
        value: String,
    },

    /// TWAP configuration violates an invariant
    #[error("Invalid TWAP config: {0}")]
    InvalidConfig(String),

    /// Unknown order status string
    #[error("Invalid order status: {0}")]
    InvalidOrderStatus(String),
}

// =============================================================================
// Fixed-point helpers
// =============================================================================

/// Number of fractional digits used for sizes and prices sent to the venue.
pub const FIXED_DECIMALS: u32 = 8;

/// Round a value to [`FIXED_DECIMALS`] digits, midpoint away from zero.
///
/// Used for limit prices.
pub fn to_fixed(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(FIXED_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

/// Truncate a value to [`FIXED_DECIMALS`] digits.
///
/// Used for order sizes so a rounded size never exceeds the amount it was
/// derived from.
pub fn truncate_fixed(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(FIXED_DECIMALS, RoundingStrategy::ToZero)
}

/// Parse a human-readable decimal string (e.g. `"83.5"`).
///
/// # Errors
/// Returns `DomainError::InvalidDecimal` if the string is not a number.
pub fn parse_decimal(field: &str, value: &str) -> Result<Decimal, DomainError> {
    Decimal::from_str(value.trim()).map_err(|_| DomainError::InvalidDecimal {
        field: field.to_string(),
        value: value.to_string(),
    })
}

// =============================================================================
// TradingPair
// =============================================================================

/// TradingPair identifies the market being bought on (e.g., ETH/USDC)
///
/// # Invariants
/// - Base and quote are non-empty ASCII alphanumerics
/// - Stored upper case
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TradingPair {
    base: String,
    quote: String,
}

impl TradingPair {
    /// Parse a pair written as `BASE/QUOTE` or `BASE-QUOTE`
    ///
    /// # Examples
    /// ```
    /// # use twap_domain::value_objects::TradingPair;
    /// let pair = TradingPair::parse("eth-usdc").unwrap();
    /// assert_eq!(pair.base(), "ETH");
    /// assert_eq!(pair.quote(), "USDC");
    /// assert_eq!(pair.as_pair(), "ETH/USDC");
    /// ```
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPair` if format is invalid
    pub fn parse(pair: &str) -> Result<Self, DomainError> {
        let mut parts = pair.trim().split(['/', '-']);

        let (Some(base), Some(quote), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(DomainError::InvalidPair(format!("Expected BASE/QUOTE, got: {}", pair)));
        };

        Self::new(base, quote)
    }

    /// Create a pair from explicit base and quote
    pub fn new(base: &str, quote: &str) -> Result<Self, DomainError> {
        let valid = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric());

        if !valid(base) || !valid(quote) {
            return Err(DomainError::InvalidPair(format!(
                "Base and quote must be non-empty alphanumerics: {}/{}",
                base, quote
            )));
        }

        Ok(Self {
            base: base.to_ascii_uppercase(),
            quote: quote.to_ascii_uppercase(),
        })
    }

    /// Get the base asset (the asset being bought)
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Get the quote asset (the asset being spent)
    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Get the pair as string (e.g., "ETH/USDC")
    pub fn as_pair(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl TryFrom<String> for TradingPair {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TradingPair> for String {
    fn from(pair: TradingPair) -> Self {
        pair.as_pair()
    }
}

// =============================================================================
// Order side / type
// =============================================================================

/// OrderSide represents the order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    /// Buy order
    Buy,
    /// Sell order
    Sell,
}

impl OrderSide {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// OrderType represents how the venue should execute the order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Rest at the given limit price or better
    Limit,
    /// Execute immediately at the best available price
    Market,
}

impl OrderType {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Limit => "limit",
            OrderType::Market => "market",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Tests
// =============================================================================
