//! Conversion between raw token amounts and decimal strings.

use alloy_core::primitives::U256;
use anyhow::{Context, Result};

/// Largest exponent for which `10^decimals` fits in a uint256.
pub const MAX_DECIMALS: u8 = 77;

fn ten_pow(decimals: u8) -> Result<U256> {
    if decimals > MAX_DECIMALS {
        anyhow::bail!(
            "Unsupported precision: {} decimals (max {})",
            decimals,
            MAX_DECIMALS
        );
    }
    Ok(U256::from(10u8).pow(U256::from(decimals)))
}

/// Format `value / 10^decimals` exactly.
///
/// Trailing fractional zeros are trimmed but one fractional digit is always kept:
/// `5_000_000` with 6 decimals is `"5.0"`, `1_234_500` is `"1.2345"`.
pub fn format_units(value: U256, decimals: u8) -> Result<String> {
    let divisor = ten_pow(decimals)?;
    let whole = value / divisor;
    let fraction = value % divisor;

    if fraction.is_zero() {
        return Ok(format!("{}.0", whole));
    }

    let fraction = format!("{:0>width$}", fraction.to_string(), width = decimals as usize);
    Ok(format!("{}.{}", whole, fraction.trim_end_matches('0')))
}

/// Parse a decimal string into a raw amount with `decimals` precision.
///
/// More fractional digits than `decimals` is an error.
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256> {
    let multiplier = ten_pow(decimals)?;
    let amount = amount.trim();

    let (whole, fraction) = match amount.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (amount, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        anyhow::bail!("Empty amount");
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        anyhow::bail!("Invalid amount '{}': expected a non-negative decimal", amount);
    }

    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > decimals as usize {
        anyhow::bail!(
            "Amount '{}' has more than {} fractional digits",
            amount,
            decimals
        );
    }

    let whole = if whole.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(whole, 10).context(format!("Amount '{}' is too large", amount))?
    };

    let fraction = if fraction.is_empty() {
        U256::ZERO
    } else {
        let padded = format!("{:0<width$}", fraction, width = decimals as usize);
        U256::from_str_radix(&padded, 10).context(format!("Invalid amount '{}'", amount))?
    };

    whole
        .checked_mul(multiplier)
        .and_then(|w| w.checked_add(fraction))
        .with_context(|| format!("Amount '{}' overflows uint256", amount))
}
