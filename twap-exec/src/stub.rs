//! Stub implementations for testing.
//!
//! Simulates a venue without making real API calls.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use twap_domain::{truncate_fixed, OrderSide, OrderStatus, OrderType, TradingPair};

use crate::error::ExecError;
use crate::ports::{ExchangePort, OrderResponse, WalletPort};

// =============================================================================
// Stub Exchange
// =============================================================================

/// How the stub answers order placements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    /// Filled in full at the market price
    Full,
    /// Acknowledged as pending, without fill fields
    Unreported,
    /// Partially filled: `size * ratio` at the market price
    Partial(Decimal),
    /// Reported failed, nothing filled
    Rejected,
}

/// An order as received by the stub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedOrder {
    /// Assigned order ID
    pub order_id: String,
    /// Market
    pub pair: TradingPair,
    /// Direction
    pub side: OrderSide,
    /// Requested size
    pub size: Decimal,
    /// Requested limit price
    pub price: Option<Decimal>,
    /// Requested order type
    pub order_type: OrderType,
}

#[derive(Debug)]
struct StubBook {
    prices: HashMap<String, Decimal>,
    fill_mode: FillMode,
    order_counter: u64,
    price_failures: VecDeque<ExecError>,
    order_failures: VecDeque<ExecError>,
    submitted: Vec<SubmittedOrder>,
    orders: HashMap<String, OrderResponse>,
    cancelled: Vec<String>,
}

/// Stub exchange for testing.
///
/// Fills at the configured market price. Failures can be scripted per call
/// kind and latency can be added to price lookups and order placement.
pub struct StubExchange {
    /// Price for pairs without an explicit one
    default_price: Decimal,
    /// Artificial delay inside `place_order`
    order_latency: Mutex<Option<Duration>>,
    /// Artificial delay inside `get_market_price`
    price_latency: Mutex<Option<Duration>>,
    book: Mutex<StubBook>,
}

impl StubExchange {
    /// Create a new stub exchange with default price.
    pub fn new(default_price: Decimal) -> Self {
        Self {
            default_price,
            order_latency: Mutex::new(None),
            price_latency: Mutex::new(None),
            book: Mutex::new(StubBook {
                prices: HashMap::new(),
                fill_mode: FillMode::Full,
                order_counter: 0,
                price_failures: VecDeque::new(),
                order_failures: VecDeque::new(),
                submitted: Vec::new(),
                orders: HashMap::new(),
                cancelled: Vec::new(),
            }),
        }
    }

    fn book(&self) -> MutexGuard<'_, StubBook> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set price for a specific pair.
    pub fn set_price(&self, pair: &TradingPair, price: Decimal) {
        self.book().prices.insert(pair.as_pair(), price);
    }

    /// Change how subsequent orders are answered.
    pub fn set_fill_mode(&self, mode: FillMode) {
        self.book().fill_mode = mode;
    }

    /// Delay every `place_order` by `latency`.
    pub fn set_order_latency(&self, latency: Duration) {
        *self.order_latency.lock().unwrap_or_else(PoisonError::into_inner) = Some(latency);
    }

    /// Delay every `get_market_price` by `latency`.
    pub fn set_price_latency(&self, latency: Duration) {
        *self.price_latency.lock().unwrap_or_else(PoisonError::into_inner) = Some(latency);
    }

    /// Fail the next `get_market_price` call with `error`.
    pub fn fail_next_price(&self, error: ExecError) {
        self.book().price_failures.push_back(error);
    }

    /// Fail the next `place_order` call with `error`.
    pub fn fail_next_order(&self, error: ExecError) {
        self.book().order_failures.push_back(error);
    }

    /// Overwrite what `get_order_status` reports for an order.
    pub fn set_order_status(&self, response: OrderResponse) {
        self.book().orders.insert(response.order_id.clone(), response);
    }

    /// Orders received so far, oldest first.
    pub fn submitted_orders(&self) -> Vec<SubmittedOrder> {
        self.book().submitted.clone()
    }

    /// IDs passed to `cancel_order`.
    pub fn cancelled_orders(&self) -> Vec<String> {
        self.book().cancelled.clone()
    }

    fn price_of(book: &StubBook, pair: &TradingPair, default_price: Decimal) -> Decimal {
        book.prices.get(&pair.as_pair()).copied().unwrap_or(default_price)
    }
}

#[async_trait]
impl ExchangePort for StubExchange {
    async fn place_order(
        &self,
        pair: &TradingPair,
        side: OrderSide,
        size: Decimal,
        price: Option<Decimal>,
        order_type: OrderType,
    ) -> Result<OrderResponse, ExecError> {
        let latency = *self.order_latency.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut book = self.book();

        if let Some(error) = book.order_failures.pop_front() {
            return Err(error);
        }

        book.order_counter += 1;
        let order_id = format!("STUB-{}", book.order_counter);
        let market = Self::price_of(&book, pair, self.default_price);

        let response = match book.fill_mode {
            FillMode::Full => OrderResponse {
                order_id: order_id.clone(),
                status: OrderStatus::Filled,
                filled_size: Some(size),
                average_price: Some(market),
            },
            FillMode::Unreported => OrderResponse {
                order_id: order_id.clone(),
                status: OrderStatus::Pending,
                filled_size: None,
                average_price: None,
            },
            FillMode::Partial(ratio) => OrderResponse {
                order_id: order_id.clone(),
                status: OrderStatus::Partial,
                filled_size: Some(truncate_fixed(size * ratio)),
                average_price: Some(market),
            },
            FillMode::Rejected => OrderResponse {
                order_id: order_id.clone(),
                status: OrderStatus::Failed,
                filled_size: None,
                average_price: None,
            },
        };

        book.submitted.push(SubmittedOrder {
            order_id: order_id.clone(),
            pair: pair.clone(),
            side,
            size,
            price,
            order_type,
        });
        book.orders.insert(order_id, response.clone());

        Ok(response)
    }

    async fn get_order_status(&self, order_id: &str) -> Result<OrderResponse, ExecError> {
        self.book()
            .orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| ExecError::Venue { status: 404, message: format!("unknown order {}", order_id) })
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), ExecError> {
        let mut book = self.book();
        if !book.orders.contains_key(order_id) {
            return Err(ExecError::Venue { status: 404, message: format!("unknown order {}", order_id) });
        }

        tracing::debug!(order_id, "Stub: order cancelled");
        book.cancelled.push(order_id.to_string());
        Ok(())
    }

    async fn get_market_price(&self, pair: &TradingPair) -> Result<Decimal, ExecError> {
        let latency = *self.price_latency.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut book = self.book();

        if let Some(error) = book.price_failures.pop_front() {
            return Err(error);
        }

        Ok(Self::price_of(&book, pair, self.default_price))
    }
}

// =============================================================================
// Stub Wallet
// =============================================================================

/// Wallet with a fixed address and a non-cryptographic signature.
#[derive(Debug, Clone)]
pub struct StubWallet {
    address: String,
}

impl StubWallet {
    /// Create a stub wallet for `address`.
    pub fn new(address: impl Into<String>) -> Self {
        Self { address: address.into() }
    }
}

impl WalletPort for StubWallet {
    fn address(&self) -> &str {
        &self.address
    }

    fn sign(&self, payload: &[u8]) -> Result<String, ExecError> {
        Ok(format!("stub-{}", payload.len()))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn eth() -> TradingPair {
        TradingPair::parse("ETH/USDC").unwrap()
    }

    #[tokio::test]
    async fn test_stub_exchange_place_order() {
        let exchange = StubExchange::new(dec!(2500));

        let result = exchange
            .place_order(&eth(), OrderSide::Buy, dec!(0.5), Some(dec!(2525)), OrderType::Limit)
            .await
            .unwrap();

        assert_eq!(result.order_id, "STUB-1");
        assert_eq!(result.status, OrderStatus::Filled);
        assert_eq!(result.filled_size, Some(dec!(0.5)));
        assert_eq!(result.average_price, Some(dec!(2500)));

        let submitted = exchange.submitted_orders();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].price, Some(dec!(2525)));
    }

    #[tokio::test]
    async fn test_stub_exchange_custom_price() {
        let exchange = StubExchange::new(dec!(2500));
        let sol = TradingPair::parse("SOL/USDC").unwrap();
        exchange.set_price(&sol, dec!(150));

        assert_eq!(exchange.get_market_price(&sol).await.unwrap(), dec!(150));
        assert_eq!(exchange.get_market_price(&eth()).await.unwrap(), dec!(2500));
    }

    #[tokio::test]
    async fn test_stub_exchange_scripted_failures() {
        let exchange = StubExchange::new(dec!(2500));
        exchange.fail_next_order(ExecError::Network("connection reset".into()));
        exchange.fail_next_price(ExecError::Timeout("price".into()));

        assert!(exchange.get_market_price(&eth()).await.is_err());
        assert!(exchange.get_market_price(&eth()).await.is_ok());

        let first = exchange
            .place_order(&eth(), OrderSide::Buy, dec!(1), Some(dec!(2525)), OrderType::Limit)
            .await;
        assert!(first.is_err());
        assert!(exchange.submitted_orders().is_empty());

        let second = exchange
            .place_order(&eth(), OrderSide::Buy, dec!(1), Some(dec!(2525)), OrderType::Limit)
            .await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_stub_exchange_fill_modes() {
        let exchange = StubExchange::new(dec!(10));

        exchange.set_fill_mode(FillMode::Partial(dec!(0.25)));
        let partial = exchange
            .place_order(&eth(), OrderSide::Buy, dec!(8), Some(dec!(10.1)), OrderType::Limit)
            .await
            .unwrap();
        assert_eq!(partial.status, OrderStatus::Partial);
        assert_eq!(partial.filled_size, Some(dec!(2)));

        exchange.set_fill_mode(FillMode::Unreported);
        let pending = exchange
            .place_order(&eth(), OrderSide::Buy, dec!(8), Some(dec!(10.1)), OrderType::Limit)
            .await
            .unwrap();
        assert_eq!(pending.status, OrderStatus::Pending);
        assert_eq!(pending.filled_size, None);

        exchange.set_fill_mode(FillMode::Rejected);
        let failed = exchange
            .place_order(&eth(), OrderSide::Buy, dec!(8), Some(dec!(10.1)), OrderType::Limit)
            .await
            .unwrap();
        assert_eq!(failed.status, OrderStatus::Failed);
    }

    #[tokio::test]
    async fn test_stub_exchange_status_and_cancel() {
        let exchange = StubExchange::new(dec!(10));
        exchange.set_fill_mode(FillMode::Unreported);

        let placed = exchange
            .place_order(&eth(), OrderSide::Buy, dec!(8), Some(dec!(10.1)), OrderType::Limit)
            .await
            .unwrap();

        let status = exchange.get_order_status(&placed.order_id).await.unwrap();
        assert_eq!(status, placed);

        exchange.cancel_order(&placed.order_id).await.unwrap();
        assert_eq!(exchange.cancelled_orders(), vec![placed.order_id.clone()]);

        assert!(exchange.get_order_status("nope").await.is_err());
        assert!(exchange.cancel_order("nope").await.is_err());
    }

    #[test]
    fn test_stub_wallet() {
        let wallet = StubWallet::new("0xabc");
        assert_eq!(wallet.address(), "0xabc");
        assert_eq!(wallet.sign(b"payload").unwrap(), "stub-7");
    }
}
