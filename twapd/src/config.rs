//! Daemon configuration.
//!
//! Loads configuration from environment variables (and `.env` if present).
//! The TWAP program itself is validated here; an invalid program never starts.

use std::env;
use std::fmt;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use twap_domain::{parse_decimal, TradingPair, TwapConfig};

use crate::error::{DaemonError, DaemonResult};

/// Default slippage tolerance (1%)
const DEFAULT_SLIPPAGE: Decimal = dec!(0.01);
/// Default minimum order size
const DEFAULT_MIN_ORDER_SIZE: Decimal = dec!(10);
/// Default maximum order size
const DEFAULT_MAX_ORDER_SIZE: Decimal = dec!(100);
/// Default completion poll interval in seconds
const DEFAULT_STATUS_POLL_SECS: u64 = 5;

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Environment (test, development, production)
    pub environment: Environment,

    /// The TWAP program to run
    pub twap: TwapConfig,

    /// Venue connection
    pub venue: VenueConfig,

    /// Host loop settings
    pub runtime: RuntimeConfig,
}

/// Venue connection settings.
///
/// Required outside the test environment.
#[derive(Clone, Default)]
pub struct VenueConfig {
    /// Venue API root
    pub url: Option<String>,
    /// Trader address
    pub wallet_address: Option<String>,
    /// Signing secret
    pub wallet_secret: Option<String>,
}

/// Host loop settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// How often the host checks whether the run completed
    pub status_poll: Duration,
    /// Reconciliation sweep period; `None` disables the sweep
    pub reconcile_every: Option<Duration>,
    /// Cancel still-open orders after the run stops
    pub cancel_on_exit: bool,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (uses stubs)
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> DaemonResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> DaemonResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = load_environment(&lookup)?;
        let twap = load_twap_config(&lookup)?;
        let venue = VenueConfig {
            url: lookup("TWAP_VENUE_URL"),
            wallet_address: lookup("TWAP_WALLET_ADDRESS"),
            wallet_secret: lookup("TWAP_WALLET_SECRET"),
        };
        let runtime = load_runtime_config(&lookup)?;

        let config = Self {
            environment,
            twap,
            venue,
            runtime,
        };
        config.check_venue()?;

        Ok(config)
    }

    /// Create test configuration.
    ///
    /// One-hour program in five-minute slices against the stub venue.
    pub fn test() -> Self {
        Self {
            environment: Environment::Test,
            twap: TwapConfig {
                pair: TradingPair::new("ETH", "USDC").expect("ETH/USDC is a valid pair"),
                total_amount: dec!(1000),
                duration_secs: 3600,
                interval_secs: 300,
                slippage_tolerance: DEFAULT_SLIPPAGE,
                min_order_size: DEFAULT_MIN_ORDER_SIZE,
                max_order_size: DEFAULT_MAX_ORDER_SIZE,
            },
            venue: VenueConfig::default(),
            runtime: RuntimeConfig {
                status_poll: Duration::from_secs(1),
                reconcile_every: None,
                cancel_on_exit: true,
            },
        }
    }

    /// Outside the test environment the venue must be fully specified.
    fn check_venue(&self) -> DaemonResult<()> {
        if self.environment == Environment::Test {
            return Ok(());
        }

        let missing: Vec<&str> = [
            ("TWAP_VENUE_URL", &self.venue.url),
            ("TWAP_WALLET_ADDRESS", &self.venue.wallet_address),
            ("TWAP_WALLET_SECRET", &self.venue.wallet_secret),
        ]
        .iter()
        .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
        .map(|(key, _)| *key)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(DaemonError::Config(format!(
                "Missing {} for {} environment",
                missing.join(", "),
                self.environment
            )))
        }
    }
}

fn load_environment(lookup: &impl Fn(&str) -> Option<String>) -> DaemonResult<Environment> {
    let env_str = lookup("TWAP_ENV").unwrap_or_else(|| "development".to_string());

    match env_str.to_lowercase().as_str() {
        "test" => Ok(Environment::Test),
        "development" | "dev" => Ok(Environment::Development),
        "production" | "prod" => Ok(Environment::Production),
        other => Err(DaemonError::Config(format!(
            "Invalid TWAP_ENV: {}. Expected: test, development, production",
            other
        ))),
    }
}

fn load_twap_config(lookup: &impl Fn(&str) -> Option<String>) -> DaemonResult<TwapConfig> {
    let pair = TradingPair::parse(&required(lookup, "TWAP_PAIR")?)?;
    let total_amount = parse_decimal("TWAP_TOTAL_AMOUNT", &required(lookup, "TWAP_TOTAL_AMOUNT")?)?;
    let duration_secs = load_u64(lookup, "TWAP_DURATION_SECS", None)?;
    let interval_secs = load_u64(lookup, "TWAP_INTERVAL_SECS", None)?;
    let slippage = load_decimal(lookup, "TWAP_SLIPPAGE_TOLERANCE", DEFAULT_SLIPPAGE)?;
    let min_order_size = load_decimal(lookup, "TWAP_MIN_ORDER_SIZE", DEFAULT_MIN_ORDER_SIZE)?;
    let max_order_size = load_decimal(lookup, "TWAP_MAX_ORDER_SIZE", DEFAULT_MAX_ORDER_SIZE)?;

    Ok(TwapConfig::new(
        pair,
        total_amount,
        duration_secs,
        interval_secs,
        slippage,
        min_order_size,
        max_order_size,
    )?)
}

fn load_runtime_config(lookup: &impl Fn(&str) -> Option<String>) -> DaemonResult<RuntimeConfig> {
    let poll_secs = load_u64(lookup, "TWAP_STATUS_POLL_SECS", Some(DEFAULT_STATUS_POLL_SECS))?;
    if poll_secs == 0 {
        return Err(DaemonError::Config("TWAP_STATUS_POLL_SECS must be positive".to_string()));
    }

    let reconcile_secs = load_u64(lookup, "TWAP_RECONCILE_SECS", Some(0))?;

    let cancel_on_exit = match lookup("TWAP_CANCEL_ON_EXIT") {
        None => true,
        Some(val) => match val.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                return Err(DaemonError::Config(format!(
                    "Invalid TWAP_CANCEL_ON_EXIT value: {}",
                    val
                )))
            }
        },
    };

    Ok(RuntimeConfig {
        status_poll: Duration::from_secs(poll_secs),
        reconcile_every: (reconcile_secs > 0).then(|| Duration::from_secs(reconcile_secs)),
        cancel_on_exit,
    })
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> DaemonResult<String> {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| DaemonError::Config(format!("Missing {}", key)))
}

fn load_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: Option<u64>) -> DaemonResult<u64> {
    match (lookup(key), default) {
        (Some(val), _) => val
            .trim()
            .parse::<u64>()
            .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val))),
        (None, Some(default)) => Ok(default),
        (None, None) => Err(DaemonError::Config(format!("Missing {}", key))),
    }
}

fn load_decimal(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: Decimal) -> DaemonResult<Decimal> {
    match lookup(key) {
        Some(val) => Ok(parse_decimal(key, &val)?),
        None => Ok(default),
    }
}

impl fmt::Debug for VenueConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VenueConfig")
            .field("url", &self.url)
            .field("wallet_address", &self.wallet_address)
            .field("wallet_secret", &self.wallet_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
