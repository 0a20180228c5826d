//! Venue REST API Client
//!
//! Implements `ExchangePort` over the venue's JSON API:
//! - Market price lookup
//! - Limit/market order placement
//! - Order status queries and cancellation
//!
//! # Authentication
//!
//! Order endpoints are signed by the configured `WalletPort`. Signed
//! requests carry:
//! - `X-TWAP-ADDRESS` header (wallet address)
//! - `X-TWAP-TIMESTAMP` header (Unix milliseconds)
//! - `X-TWAP-SIGNATURE` header (signature of `timestamp + METHOD + path + body`)
//!
//! # Units
//!
//! Every amount on the wire is an integer scaled by 10^18 and carried as a
//! string; see [`crate::scaling`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::time::timeout;
use tracing::debug;

use twap_domain::{OrderSide, OrderStatus, OrderType, TradingPair};
use twap_exec::{ExchangePort, ExecError, OrderResponse, RetryPolicy, WalletPort};

use crate::scaling::{from_venue_units, to_venue_units};

// =============================================================================
// Constants
// =============================================================================

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 10;

const HEADER_ADDRESS: &str = "X-TWAP-ADDRESS";
const HEADER_TIMESTAMP: &str = "X-TWAP-TIMESTAMP";
const HEADER_SIGNATURE: &str = "X-TWAP-SIGNATURE";

// =============================================================================
// Venue REST Client
// =============================================================================

/// REST client for the trading venue.
pub struct VenueRestClient {
    /// HTTP client
    client: Client,
    /// Base URL without trailing slash
    base_url: String,
    /// Signing identity
    wallet: Arc<dyn WalletPort>,
    /// Retry policy applied to every call
    retry: RetryPolicy,
    /// Per-request timeout
    request_timeout: Duration,
}

impl VenueRestClient {
    /// Create a new venue client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Venue API root, e.g. `https://venue.example/api`
    /// * `wallet` - Identity used to sign order requests
    pub fn new(base_url: impl Into<String>, wallet: Arc<dyn WalletPort>) -> Result<Self, ExecError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ExecError::Config(format!("invalid venue URL: {:?}", base_url)));
        }

        Ok(Self {
            client: Client::new(),
            base_url,
            wallet,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        })
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the per-request timeout.
    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Venue API root.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Address orders are placed for.
    pub fn trader(&self) -> &str {
        self.wallet.address()
    }

    /// Signature headers for a request.
    fn signed_headers(&self, method: &Method, path: &str, body: &str) -> Result<[(&'static str, String); 3], ExecError> {
        let timestamp = Utc::now().timestamp_millis().to_string();
        let payload = signing_payload(&timestamp, method, path, body);
        let signature = self.wallet.sign(payload.as_bytes())?;

        Ok([
            (HEADER_ADDRESS, self.wallet.address().to_string()),
            (HEADER_TIMESTAMP, timestamp),
            (HEADER_SIGNATURE, signature),
        ])
    }

    /// Send one request and return the body of a 2xx response.
    async fn send(&self, method: Method, path: &str, body: Option<String>, signed: bool) -> Result<String, ExecError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.request(method.clone(), &url);

        if signed {
            for (name, value) in self.signed_headers(&method, path, body.as_deref().unwrap_or(""))? {
                request = request.header(name, value);
            }
        }

        if let Some(body) = body {
            request = request.header(reqwest::header::CONTENT_TYPE, "application/json").body(body);
        }

        debug!(%method, path, "Venue request");

        let response = timeout(self.request_timeout, request.send())
            .await
            .map_err(|_| ExecError::Timeout(format!("{} {}", method, path)))?
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_transport_error)?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|err| err.error)
                .unwrap_or_else(|_| {
                    if body.trim().is_empty() {
                        status.canonical_reason().unwrap_or("no reason").to_string()
                    } else {
                        body
                    }
                });
            return Err(ExecError::Venue { status: status.as_u16(), message });
        }

        Ok(body)
    }

    /// Send with the retry policy.
    async fn call(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        body: Option<String>,
        signed: bool,
    ) -> Result<String, ExecError> {
        self.retry
            .run(operation, || self.send(method.clone(), path, body.clone(), signed))
            .await
    }
}

#[async_trait]
impl ExchangePort for VenueRestClient {
    async fn place_order(
        &self,
        pair: &TradingPair,
        side: OrderSide,
        size: Decimal,
        price: Option<Decimal>,
        order_type: OrderType,
    ) -> Result<OrderResponse, ExecError> {
        let request = PlaceOrderRequest {
            pair: pair.as_pair(),
            side: side.as_str(),
            order_type: order_type.as_str(),
            size: to_venue_units(size)?,
            price: price.map(to_venue_units).transpose()?,
            trader: self.wallet.address(),
        };
        let body = serde_json::to_string(&request).map_err(|e| ExecError::Parse(e.to_string()))?;

        let response = self.call("place_order", Method::POST, "/orders", Some(body), true).await?;

        parse_order(&response)
    }

    async fn get_order_status(&self, order_id: &str) -> Result<OrderResponse, ExecError> {
        let path = order_path(order_id, "")?;
        let response = self.call("get_order_status", Method::GET, &path, None, true).await?;

        parse_order(&response)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), ExecError> {
        let path = order_path(order_id, "/cancel")?;
        self.call("cancel_order", Method::POST, &path, None, true).await?;
        Ok(())
    }

    async fn get_market_price(&self, pair: &TradingPair) -> Result<Decimal, ExecError> {
        let path = format!("/markets/{}-{}/price", pair.base(), pair.quote());
        let body = self.call("get_market_price", Method::GET, &path, None, false).await?;

        let response: PriceBody = serde_json::from_str(&body).map_err(|e| ExecError::Parse(e.to_string()))?;
        let price = response.price.ok_or_else(|| ExecError::MissingField("price".to_string()))?;

        from_venue_units(&price)
    }
}

// =============================================================================
// Wire Types
// =============================================================================

/// Venue error response.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Order placement request.
#[derive(Debug, Serialize)]
struct PlaceOrderRequest<'a> {
    pair: String,
    side: &'a str,
    #[serde(rename = "type")]
    order_type: &'a str,
    size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    price: Option<String>,
    trader: &'a str,
}

/// Order placement / status response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderBody {
    #[serde(deserialize_with = "string_or_number")]
    order_id: String,
    status: String,
    filled_size: Option<String>,
    average_price: Option<String>,
}

/// Price lookup response.
#[derive(Debug, Deserialize)]
struct PriceBody {
    #[allow(dead_code)]
    pair: Option<String>,
    price: Option<String>,
}

/// Accept an order ID sent either as a JSON string or a number.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid order id: {}", other))),
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Bytes covered by the request signature.
fn signing_payload(timestamp: &str, method: &Method, path: &str, body: &str) -> String {
    format!("{}{}{}{}", timestamp, method.as_str(), path, body)
}

/// `/orders/{id}{suffix}`. IDs that would not form a single path segment are
/// refused before anything is sent.
fn order_path(order_id: &str, suffix: &str) -> Result<String, ExecError> {
    let valid = !order_id.is_empty()
        && order_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'));

    if !valid || order_id == "." || order_id == ".." {
        return Err(ExecError::Parse(format!("invalid order id {:?}", order_id)));
    }

    Ok(format!("/orders/{}{}", order_id, suffix))
}

/// Map a venue status string onto `OrderStatus`.
pub fn parse_status(status: &str) -> Result<OrderStatus, ExecError> {
    match status.to_ascii_lowercase().as_str() {
        "open" | "new" | "pending" | "accepted" => Ok(OrderStatus::Pending),
        "filled" | "closed" => Ok(OrderStatus::Filled),
        "partial" | "partially_filled" => Ok(OrderStatus::Partial),
        "failed" | "rejected" | "cancelled" | "canceled" | "expired" => Ok(OrderStatus::Failed),
        other => Err(ExecError::Parse(format!("unknown order status {:?}", other))),
    }
}

fn parse_order(body: &str) -> Result<OrderResponse, ExecError> {
    let order: OrderBody = serde_json::from_str(body).map_err(|e| ExecError::Parse(e.to_string()))?;

    Ok(OrderResponse {
        status: parse_status(&order.status)?,
        filled_size: order.filled_size.as_deref().map(from_venue_units).transpose()?,
        average_price: order.average_price.as_deref().map(from_venue_units).transpose()?,
        order_id: order.order_id,
    })
}

fn map_transport_error(e: reqwest::Error) -> ExecError {
    if e.is_timeout() {
        ExecError::Timeout(e.to_string())
    } else {
        ExecError::Network(e.to_string())
    }
}

// =============================================================================
// Tests
// =============================================================================
