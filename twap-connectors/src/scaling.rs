//! Venue unit conversion.
//!
//! The venue carries every quantity and price as an integer scaled by 10^18,
//! serialized as a decimal string. Amounts are held in a 96-bit decimal, so
//! the largest convertible amount is about 7.9 * 10^10 units; anything larger
//! is rejected. Digits beyond the 18th fractional place are truncated.

use rust_decimal::Decimal;

use twap_exec::ExecError;

/// Fractional digits carried by venue units.
pub const VENUE_DECIMALS: u32 = 18;

/// 10^18 as a decimal.
fn scale() -> Decimal {
    Decimal::from_i128_with_scale(10_i128.pow(VENUE_DECIMALS), 0)
}

/// Convert a human-readable amount into venue units.
///
/// # Errors
///
/// `InvalidAmount` for negative amounts and for amounts too large to scale.
pub fn to_venue_units(amount: Decimal) -> Result<String, ExecError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(ExecError::InvalidAmount(format!("negative amount {}", amount)));
    }

    let scaled = amount
        .checked_mul(scale())
        .ok_or_else(|| ExecError::InvalidAmount(format!("{} exceeds venue unit range", amount)))?;

    Ok(scaled.trunc().normalize().to_string())
}

/// Convert venue units back into a human-readable amount.
///
/// # Errors
///
/// `InvalidAmount` for negative, non-integer or out-of-range input.
pub fn from_venue_units(units: &str) -> Result<Decimal, ExecError> {
    let trimmed = units.trim();

    let raw: i128 = trimmed
        .parse()
        .map_err(|_| ExecError::InvalidAmount(format!("not an integer amount: {:?}", units)))?;

    if raw < 0 {
        return Err(ExecError::InvalidAmount(format!("negative amount {}", trimmed)));
    }

    Decimal::try_from_i128_with_scale(raw, VENUE_DECIMALS)
        .map(|amount| amount.normalize())
        .map_err(|_| ExecError::InvalidAmount(format!("{} exceeds decimal range", trimmed)))
}
