//! Execution layer port definitions.
//!
//! Ports define the interfaces for external services (venue, wallet).
//! Adapters implement these ports for specific services (HTTP venue, stub, etc.).

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use twap_domain::{OrderSide, OrderStatus, OrderType, TradingPair};

use crate::error::ExecError;

// =============================================================================
// Exchange Port
// =============================================================================

/// Port for venue operations.
///
/// Amounts cross this boundary as human-readable decimals; adapters own any
/// wire scaling.
///
/// Implementations:
/// - `StubExchange` - For testing (immediate fills at configured price)
/// - `VenueRestClient` - HTTP venue with retry/backoff
#[async_trait]
pub trait ExchangePort: Send + Sync {
    /// Place an order.
    ///
    /// # Arguments
    ///
    /// * `pair` - Market to trade
    /// * `side` - Buy or Sell
    /// * `size` - Amount of the base asset
    /// * `price` - Limit price (`None` for market orders)
    /// * `order_type` - Limit or Market
    async fn place_order(
        &self,
        pair: &TradingPair,
        side: OrderSide,
        size: Decimal,
        price: Option<Decimal>,
        order_type: OrderType,
    ) -> Result<OrderResponse, ExecError>;

    /// Query the current state of an order.
    async fn get_order_status(&self, order_id: &str) -> Result<OrderResponse, ExecError>;

    /// Cancel an open order.
    async fn cancel_order(&self, order_id: &str) -> Result<(), ExecError>;

    /// Current market price for a pair.
    async fn get_market_price(&self, pair: &TradingPair) -> Result<Decimal, ExecError>;
}

/// Venue answer to a placement or status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResponse {
    /// Venue-assigned order ID
    pub order_id: String,
    /// Order status
    pub status: OrderStatus,
    /// Filled size, when the venue reports one
    pub filled_size: Option<Decimal>,
    /// Average fill price, when the venue reports one
    pub average_price: Option<Decimal>,
}

// =============================================================================
// Wallet Port
// =============================================================================

/// Identity used for authenticated venue calls.
///
/// Key material handling is up to the implementation; callers only see the
/// address and signatures.
pub trait WalletPort: Send + Sync {
    /// Public address of the account placing orders.
    fn address(&self) -> &str;

    /// Sign a request payload, returning the hex-encoded signature.
    fn sign(&self, payload: &[u8]) -> Result<String, ExecError>;
}

// =============================================================================
// Tests
// =============================================================================
