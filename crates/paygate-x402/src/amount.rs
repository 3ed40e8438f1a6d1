//! Display-unit prices to exact base-unit integers.
//!
//! All arithmetic is done on decimal strings and [`U256`]; no `f64` anywhere
//! in the pipeline. Fractional digits beyond the token's decimals are
//! truncated, matching on-chain integer semantics.

use std::str::FromStr;

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_AMOUNT, DEFAULT_TOKEN_DECIMALS, MAX_TOKEN_DECIMALS};
use crate::payment::PaymentRequirements;
use crate::X402Error;

/// A price in display units: `"$0.01"`, `"0.01"`, or a JSON number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Money {
    Number(serde_json::Number),
    Text(String),
}

impl Money {
    /// The price as a plain decimal string (currency sign and whitespace removed).
    pub fn as_decimal(&self) -> String {
        match self {
            Money::Number(n) => n.to_string(),
            Money::Text(s) => {
                let s = s.trim();
                s.strip_prefix('$').unwrap_or(s).trim().to_string()
            }
        }
    }
}

impl From<&str> for Money {
    fn from(s: &str) -> Self {
        Money::Text(s.to_string())
    }
}

impl From<String> for Money {
    fn from(s: String) -> Self {
        Money::Text(s)
    }
}

impl FromStr for Money {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Money::from(s))
    }
}

fn invalid(amount: &str, reason: impl Into<String>) -> X402Error {
    X402Error::InvalidAmount {
        amount: amount.to_string(),
        reason: reason.into(),
    }
}

/// Convert a display-unit amount into base units, truncating extra fraction digits.
///
/// `to_base_units("0.01", 6) == "10000"`. A leading `$` is accepted.
pub fn to_base_units(amount: &str, decimals: u8) -> Result<String, X402Error> {
    if decimals > MAX_TOKEN_DECIMALS {
        return Err(invalid(
            amount,
            format!("{decimals} decimals exceeds the maximum of {MAX_TOKEN_DECIMALS}"),
        ));
    }

    let cleaned = Money::from(amount).as_decimal();
    if cleaned.is_empty() {
        return Err(invalid(amount, "no numeric content"));
    }
    if cleaned.starts_with('-') {
        return Err(invalid(amount, "negative amounts are not allowed"));
    }

    let (integer_part, fractional_part) = cleaned.split_once('.').unwrap_or((&cleaned, ""));
    if integer_part.is_empty() && fractional_part.is_empty() {
        return Err(invalid(amount, "no digits"));
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(integer_part) || !all_digits(fractional_part) {
        return Err(invalid(amount, "not a plain decimal number"));
    }

    // Pad or truncate the fraction to exactly `decimals` digits.
    let decimals = decimals as usize;
    let fraction: String = fractional_part
        .chars()
        .chain(std::iter::repeat('0'))
        .take(decimals)
        .collect();

    let digits = format!("{integer_part}{fraction}");
    if digits.is_empty() {
        return Ok("0".to_string());
    }

    let value = U256::from_str_radix(&digits, 10)
        .map_err(|e| invalid(amount, format!("out of range: {e}")))?;
    Ok(value.to_string())
}

/// [`to_base_units`], degrading to [`DEFAULT_AMOUNT`] on failure.
///
/// The fallback changes the effective price, so it is always logged.
pub fn normalize_amount(amount: &str, decimals: u8) -> String {
    match to_base_units(amount, decimals) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(
                amount,
                decimals,
                error = %e,
                fallback = DEFAULT_AMOUNT,
                "amount normalization failed, substituting default amount"
            );
            DEFAULT_AMOUNT.to_string()
        }
    }
}

/// Render a base-unit amount in display units (`"10000"`, 6 → `"0.01"`).
pub fn from_base_units(amount: &str, decimals: u8) -> Option<String> {
    if amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let decimals = decimals as usize;
    let trimmed = amount.trim_start_matches('0');
    let padded = format!("{trimmed:0>width$}", width = decimals + 1);
    let (integer, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        Some(integer.to_string())
    } else {
        Some(format!("{integer}.{fraction}"))
    }
}

/// Return a copy of `requirements` whose `maxAmountRequired` is a valid
/// base-unit integer string.
///
/// If `amount` (display units) is given it replaces the requirement's amount,
/// scaled by the decimals advertised in `extra` (default 6). Whatever the
/// outcome, a missing or non-integer amount is replaced by [`DEFAULT_AMOUNT`].
pub fn ensure_valid_amount(
    requirements: &PaymentRequirements,
    amount: Option<&str>,
) -> PaymentRequirements {
    let mut updated = requirements.clone();

    if let Some(amount) = amount {
        let decimals = updated
            .extra
            .as_ref()
            .and_then(|e| e.decimals())
            .unwrap_or(DEFAULT_TOKEN_DECIMALS);
        match to_base_units(amount, decimals) {
            Ok(value) => updated.max_amount_required = value,
            Err(e) => tracing::warn!(error = %e, "failed to apply amount override"),
        }
    }

    let amount = &updated.max_amount_required;
    if amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
        tracing::warn!(
            amount = %amount,
            fallback = DEFAULT_AMOUNT,
            "requirement amount is not a base-unit integer, substituting default amount"
        );
        updated.max_amount_required = DEFAULT_AMOUNT.to_string();
    }

    updated
}
