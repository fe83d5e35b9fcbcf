//! Exact decimal arithmetic for monetary and quantity values
//!
//! Every price, quantity, PnL, drawdown, and exposure figure in the engine
//! routes through this module so long-running sessions never accumulate
//! binary floating-point drift. The string-facing operations mirror the
//! persistence contract (decimal strings in, decimal strings out); the
//! `Decimal`-level helpers serve internal callers that already hold parsed
//! values.

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;
use thiserror::Error;

/// Decimal places for money amounts (default arithmetic contract).
pub const MONEY_DP: u32 = 2;
/// Decimal places for prices.
pub const PRICE_DP: u32 = 8;
/// Decimal places for quantities.
pub const QTY_DP: u32 = 8;
/// Decimal places for percentages.
pub const PCT_DP: u32 = 4;

/// Decimal arithmetic errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecimalError {
    /// Input string is not a valid decimal number
    #[error("non-numeric decimal input: {0:?}")]
    TypeMismatch(String),
    /// Divisor is exactly zero
    #[error("division by zero")]
    DivisionByZero,
    /// Percentage-change base value is zero
    #[error("percentage change base value is zero")]
    ZeroBaseValue,
}

/// Parse a decimal string. Empty (or whitespace-only) input is treated as
/// zero; anything else non-numeric is a `TypeMismatch`.
pub fn parse(input: &str) -> Result<Decimal, DecimalError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(trimmed).map_err(|_| DecimalError::TypeMismatch(input.to_string()))
}

fn round_dp(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Round to money precision (2 decimal places).
pub fn round_money(value: Decimal) -> Decimal {
    round_dp(value, MONEY_DP)
}

/// Round to price precision (8 decimal places).
pub fn round_price(value: Decimal) -> Decimal {
    round_dp(value, PRICE_DP)
}

/// Round to quantity precision (8 decimal places).
pub fn round_qty(value: Decimal) -> Decimal {
    round_dp(value, QTY_DP)
}

/// Round to percentage precision (4 decimal places).
pub fn round_pct(value: Decimal) -> Decimal {
    round_dp(value, PCT_DP)
}

/// Add two decimal strings, rounded to 2 decimal places.
pub fn add(a: &str, b: &str) -> Result<String, DecimalError> {
    Ok(round_money(parse(a)? + parse(b)?).to_string())
}

/// Subtract `b` from `a`, rounded to 2 decimal places.
pub fn subtract(a: &str, b: &str) -> Result<String, DecimalError> {
    Ok(round_money(parse(a)? - parse(b)?).to_string())
}

/// Multiply two decimal strings, rounded to 2 decimal places.
pub fn multiply(a: &str, b: &str) -> Result<String, DecimalError> {
    Ok(round_money(parse(a)? * parse(b)?).to_string())
}

/// Divide `a` by `b` at the default precision of 8 decimal places.
pub fn divide(a: &str, b: &str) -> Result<String, DecimalError> {
    divide_with_precision(a, b, PRICE_DP)
}

/// Divide `a` by `b`, rounded to `precision` decimal places. Fails with
/// `DivisionByZero` when `b` is exactly zero.
pub fn divide_with_precision(a: &str, b: &str, precision: u32) -> Result<String, DecimalError> {
    let numerator = parse(a)?;
    let denominator = parse(b)?;
    let quotient = div(numerator, denominator)?;
    let mut rounded = round_dp(quotient, precision);
    rounded.rescale(precision);
    Ok(rounded.to_string())
}

/// `Decimal`-level division with the `DivisionByZero` contract.
pub fn div(a: Decimal, b: Decimal) -> Result<Decimal, DecimalError> {
    if b == Decimal::ZERO {
        return Err(DecimalError::DivisionByZero);
    }
    a.checked_div(b).ok_or(DecimalError::DivisionByZero)
}

/// Percentage change from `old_val` to `new_val`, rounded to 4 decimal
/// places. Fails with `ZeroBaseValue` when the base is zero.
pub fn pct_change(old_val: &str, new_val: &str) -> Result<String, DecimalError> {
    let mut pct = pct_change_dec(parse(old_val)?, parse(new_val)?)?;
    pct.rescale(PCT_DP);
    Ok(pct.to_string())
}

/// `Decimal`-level percentage change: `(new - old) / |old| * 100`.
pub fn pct_change_dec(old_val: Decimal, new_val: Decimal) -> Result<Decimal, DecimalError> {
    if old_val == Decimal::ZERO {
        return Err(DecimalError::ZeroBaseValue);
    }
    let change = div(new_val - old_val, old_val.abs())? * Decimal::ONE_HUNDRED;
    Ok(round_pct(change))
}

/// `a > b` on exact decimal value.
pub fn is_greater_than(a: &str, b: &str) -> Result<bool, DecimalError> {
    Ok(parse(a)? > parse(b)?)
}

/// `a >= b` on exact decimal value.
pub fn is_greater_or_equal(a: &str, b: &str) -> Result<bool, DecimalError> {
    Ok(parse(a)? >= parse(b)?)
}

/// `a < b` on exact decimal value.
pub fn is_less_than(a: &str, b: &str) -> Result<bool, DecimalError> {
    Ok(parse(a)? < parse(b)?)
}

/// `a <= b` on exact decimal value.
pub fn is_less_or_equal(a: &str, b: &str) -> Result<bool, DecimalError> {
    Ok(parse(a)? <= parse(b)?)
}

/// True when the value is exactly zero. `"-0"` counts as zero.
pub fn is_zero(a: &str) -> Result<bool, DecimalError> {
    Ok(parse(a)? == Decimal::ZERO)
}

/// Round `value` down to the nearest multiple of `step`, preserving the
/// step's decimal-place count. A zero step is the identity.
pub fn floor_to_step(value: &str, step: &str) -> Result<String, DecimalError> {
    let v = parse(value)?;
    let s = parse(step)?;
    Ok(floor_to_step_dec(v, s).to_string())
}

/// `Decimal`-level [`floor_to_step`].
pub fn floor_to_step_dec(value: Decimal, step: Decimal) -> Decimal {
    if step == Decimal::ZERO {
        return value;
    }
    // step is non-zero so the division cannot fail
    let mut floored = (value / step).floor() * step;
    floored.rescale(step.scale());
    floored
}
