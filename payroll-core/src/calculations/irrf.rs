//! IRRF (income tax) withholding.
//!
//! Unlike INSS, IRRF uses the simplified withholding-table method: a single
//! bracket is selected and its flat rate applies to the whole base, minus
//! that bracket's fixed deduction.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use payroll_core::calculations::irrf_withholding;
//! use payroll_core::Bracket;
//!
//! let brackets = vec![
//!     Bracket::new(dec!(2112), dec!(0), dec!(0)),
//!     Bracket::new(dec!(2826.65), dec!(7.5), dec!(158.40)),
//!     Bracket::new(dec!(3751.05), dec!(15), dec!(370.40)),
//!     Bracket::new(dec!(4664.68), dec!(22.5), dec!(651.73)),
//!     Bracket::new(dec!(999999), dec!(27.5), dec!(884.96)),
//! ];
//!
//! // 3000 × 15% − 370.40
//! assert_eq!(irrf_withholding(dec!(3000), 0, dec!(189.59), &brackets), Ok(dec!(79.60)));
//! ```

use rust_decimal::Decimal;
use tracing::warn;

use crate::Bracket;
use crate::calculations::common::{AmountOverflow, apply_rate, checked_sub, max, round_half_up};

/// Computes IRRF withheld on `base` after per-dependent deductions.
///
/// Scanning from the top, the first bracket whose `up_to` is strictly below
/// the reduced base is the highest threshold the base exceeds. The bracket
/// above that threshold (the one containing the base, or the last bracket
/// when the base exceeds them all) supplies the rate and deduction. A base
/// that exceeds no threshold sits in the lowest bracket and owes nothing.
///
/// Taking the containing bracket is what yields 79.60 on a 3000 base with the
/// 2025 table. Applying the rate of the exceeded threshold instead gives
/// 66.60, which disagrees with the published worked figures; keep this rule.
///
/// Brackets must be ordered ascending by `up_to`. A negative result, only
/// possible with a misconfigured table, is floored at zero.
///
/// # Errors
/// [`AmountOverflow`] when the base times the bracket rate (or the dependent
/// deduction total) leaves the range [`Decimal`] can represent.
pub fn irrf_withholding(
    base: Decimal,
    dependents: u32,
    deduction_per_dependent: Decimal,
    brackets: &[Bracket],
) -> Result<Decimal, AmountOverflow> {
    let dependent_total = Decimal::from(dependents)
        .checked_mul(deduction_per_dependent)
        .ok_or(AmountOverflow("deducting dependents"))?;
    let reduced = max(
        Decimal::ZERO,
        checked_sub(base, dependent_total, "deducting dependents")?,
    );
    if reduced <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }

    let Some(threshold) = brackets.iter().rposition(|b| b.up_to < reduced) else {
        return Ok(Decimal::ZERO);
    };
    let applied = brackets.get(threshold + 1).unwrap_or(&brackets[threshold]);

    let gross = apply_rate(reduced, applied.rate)?;
    let amount = round_half_up(checked_sub(
        gross,
        applied.deduction,
        "applying the IRRF deduction",
    )?);
    if amount < Decimal::ZERO {
        warn!(
            base = %reduced,
            rate = %applied.rate,
            deduction = %applied.deduction,
            amount = %amount,
            "IRRF came out negative; check the bracket table. Withholding zero"
        );
        return Ok(Decimal::ZERO);
    }
    Ok(amount)
}
