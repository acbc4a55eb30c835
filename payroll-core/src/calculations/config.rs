use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WithholdingConfigError {
    #[error("INSS ceiling must be positive, got {0}")]
    InvalidInssCeiling(Decimal),

    #[error("IRRF per-dependent deduction must be non-negative, got {0}")]
    InvalidDependentDeduction(Decimal),
}

/// Statutory constants that sit outside the yearly bracket tables.
///
/// ```
/// use rust_decimal_macros::dec;
/// use payroll_core::calculations::WithholdingConfig;
///
/// let config = WithholdingConfig::default();
/// assert_eq!(config.inss_ceiling, dec!(7786.02));
/// assert_eq!(config.irrf_dependent_deduction, dec!(189.59));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithholdingConfig {
    /// Maximum base subject to INSS, whatever the table says.
    pub inss_ceiling: Decimal,

    /// Amount subtracted from the IRRF base for each dependent.
    pub irrf_dependent_deduction: Decimal,
}

impl WithholdingConfig {
    /// 7786.02, the contribution ceiling.
    pub const DEFAULT_INSS_CEILING: Decimal = Decimal::from_parts(778602, 0, 0, false, 2);

    /// 189.59 per dependent.
    pub const DEFAULT_IRRF_DEPENDENT_DEDUCTION: Decimal = Decimal::from_parts(18959, 0, 0, false, 2);

    pub fn validate(&self) -> Result<(), WithholdingConfigError> {
        if self.inss_ceiling <= Decimal::ZERO {
            return Err(WithholdingConfigError::InvalidInssCeiling(self.inss_ceiling));
        }
        if self.irrf_dependent_deduction < Decimal::ZERO {
            return Err(WithholdingConfigError::InvalidDependentDeduction(
                self.irrf_dependent_deduction,
            ));
        }
        Ok(())
    }

    /// Builds a configuration from plain floats, as found in TOML files.
    ///
    /// Returns `None` when either value is not finite.
    pub fn from_f64(
        inss_ceiling: f64,
        irrf_dependent_deduction: f64,
    ) -> Option<Self> {
        Some(Self {
            inss_ceiling: Decimal::from_f64(inss_ceiling)?.round_dp(2),
            irrf_dependent_deduction: Decimal::from_f64(irrf_dependent_deduction)?.round_dp(2),
        })
    }
}

impl Default for WithholdingConfig {
    fn default() -> Self {
        Self {
            inss_ceiling: Self::DEFAULT_INSS_CEILING,
            irrf_dependent_deduction: Self::DEFAULT_IRRF_DEPENDENT_DEDUCTION,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(WithholdingConfig::default().validate(), Ok(()));
    }

    #[test]
    fn zero_ceiling_is_rejected() {
        let config = WithholdingConfig {
            inss_ceiling: dec!(0),
            ..WithholdingConfig::default()
        };

        assert_eq!(
            config.validate(),
            Err(WithholdingConfigError::InvalidInssCeiling(dec!(0)))
        );
    }

    #[test]
    fn negative_dependent_deduction_is_rejected() {
        let config = WithholdingConfig {
            irrf_dependent_deduction: dec!(-1),
            ..WithholdingConfig::default()
        };

        assert_eq!(
            config.validate(),
            Err(WithholdingConfigError::InvalidDependentDeduction(dec!(-1)))
        );
    }

    #[test]
    fn from_f64_rejects_non_finite_values() {
        assert_eq!(WithholdingConfig::from_f64(f64::NAN, 189.59), None);
        assert_eq!(WithholdingConfig::from_f64(7786.02, f64::INFINITY), None);
    }

    #[test]
    fn from_f64_rounds_to_cents() {
        let config = WithholdingConfig::from_f64(8157.41, 189.59).expect("finite");

        assert_eq!(config.inss_ceiling, dec!(8157.41));
        assert_eq!(config.irrf_dependent_deduction, dec!(189.59));
    }
}
