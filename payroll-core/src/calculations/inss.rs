//! INSS (social security) withholding.
//!
//! INSS is marginal: each bracket's rate applies only to the slice of the
//! base that falls inside that bracket, and the base is capped at the
//! contribution ceiling before any slicing happens.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use payroll_core::calculations::inss_withholding;
//! use payroll_core::Bracket;
//!
//! let brackets = vec![
//!     Bracket::new(dec!(1412), dec!(7.5), dec!(0)),
//!     Bracket::new(dec!(2666.68), dec!(9), dec!(0)),
//!     Bracket::new(dec!(4000.03), dec!(12), dec!(0)),
//!     Bracket::new(dec!(7786.02), dec!(14), dec!(0)),
//! ];
//!
//! // 1412 × 7.5% + (2000 − 1412) × 9%
//! assert_eq!(inss_withholding(dec!(2000), &brackets, dec!(7786.02)), Ok(dec!(158.82)));
//! ```

use rust_decimal::Decimal;

use crate::Bracket;
use crate::calculations::common::{AmountOverflow, apply_rate, checked_add, min, round_half_up};

/// Computes INSS withheld on `base` using marginal brackets capped at `ceiling`.
///
/// Brackets must be ordered ascending by `up_to`. Walking stops when the
/// base is fully allocated or the brackets run out; a base above the last
/// bracket (but under the ceiling) is not taxed beyond it. The total is
/// rounded half-up to cents once, after accumulation.
///
/// # Errors
/// [`AmountOverflow`] when a bracket slice times its rate leaves the
/// representable range, which takes an absurd ceiling or rate.
pub fn inss_withholding(
    base: Decimal,
    brackets: &[Bracket],
    ceiling: Decimal,
) -> Result<Decimal, AmountOverflow> {
    if base <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }

    let mut remaining = min(base, ceiling);
    let mut total = Decimal::ZERO;
    let mut previous_up_to = Decimal::ZERO;

    for bracket in brackets {
        if remaining <= Decimal::ZERO {
            break;
        }
        let up_to = min(bracket.up_to, ceiling);
        let slice = min(remaining, up_to - previous_up_to);
        if slice <= Decimal::ZERO {
            break;
        }
        total = checked_add(total, apply_rate(slice, bracket.rate)?, "summing INSS slices")?;
        remaining -= slice;
        previous_up_to = up_to;
    }

    Ok(round_half_up(total))
}
