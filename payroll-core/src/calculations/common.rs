//! Common utility functions for withholding calculations.
//!
//! This module provides shared functionality used by both bracket
//! calculators and the recomputation engine, chiefly monetary rounding and
//! overflow-checked arithmetic.

use rust_decimal::Decimal;
use thiserror::Error;

/// A money operation left the range [`Decimal`] can represent.
///
/// `Decimal` arithmetic panics on overflow, so every sum or product of
/// caller-supplied amounts goes through the checked helpers below.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("amount out of range while {0}")]
pub struct AmountOverflow(pub &'static str);

/// Rounds a decimal value to exactly two decimal places using half-up rounding.
///
/// Values at exactly 0.005 are rounded away from zero, the usual rule for
/// payroll amounts.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use payroll_core::calculations::common::round_half_up;
///
/// assert_eq!(round_half_up(dec!(258.8196)), dec!(258.82));
/// assert_eq!(round_half_up(dec!(123.455)), dec!(123.46));
/// assert_eq!(round_half_up(dec!(-123.455)), dec!(-123.46)); // Away from zero
/// ```
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

/// Returns the maximum of two decimal values.
///
/// ```
/// use rust_decimal_macros::dec;
/// use payroll_core::calculations::common::max;
///
/// assert_eq!(max(dec!(-25.00), dec!(0)), dec!(0));
/// ```
pub fn max(
    a: Decimal,
    b: Decimal,
) -> Decimal {
    if a > b { a } else { b }
}

/// Returns the minimum of two decimal values.
///
/// ```
/// use rust_decimal_macros::dec;
/// use payroll_core::calculations::common::min;
///
/// assert_eq!(min(dec!(10000), dec!(7786.02)), dec!(7786.02));
/// ```
pub fn min(
    a: Decimal,
    b: Decimal,
) -> Decimal {
    if a < b { a } else { b }
}

/// Applies a percentage rate (`7.5` = 7.5%) to an amount without rounding.
///
/// ```
/// use rust_decimal::Decimal;
/// use rust_decimal_macros::dec;
/// use payroll_core::calculations::common::apply_rate;
///
/// assert_eq!(apply_rate(dec!(1412), dec!(7.5)), Ok(dec!(105.9)));
/// assert!(apply_rate(Decimal::MAX, dec!(27.5)).is_err());
/// ```
pub fn apply_rate(
    amount: Decimal,
    rate_percent: Decimal,
) -> Result<Decimal, AmountOverflow> {
    amount
        .checked_mul(rate_percent)
        .and_then(|product| product.checked_div(Decimal::ONE_HUNDRED))
        .ok_or(AmountOverflow("applying a rate"))
}

/// `a + b`, or [`AmountOverflow`] naming `what` was being summed.
pub fn checked_add(
    a: Decimal,
    b: Decimal,
    what: &'static str,
) -> Result<Decimal, AmountOverflow> {
    a.checked_add(b).ok_or(AmountOverflow(what))
}

/// `a - b`, or [`AmountOverflow`] naming `what` was being computed.
pub fn checked_sub(
    a: Decimal,
    b: Decimal,
    what: &'static str,
) -> Result<Decimal, AmountOverflow> {
    a.checked_sub(b).ok_or(AmountOverflow(what))
}

/// Sums `values`, failing instead of panicking when the total overflows.
pub fn checked_sum(
    values: impl IntoIterator<Item = Decimal>,
    what: &'static str,
) -> Result<Decimal, AmountOverflow> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, value| checked_add(acc, value, what))
}
