use rust_decimal::Decimal;

use crate::TaxBracketTable;
use crate::calculations::common::AmountOverflow;
use crate::calculations::config::{WithholdingConfig, WithholdingConfigError};
use crate::calculations::inss::inss_withholding;
use crate::calculations::irrf::irrf_withholding;

/// Applies bracket tables under a given [`WithholdingConfig`].
///
/// ```
/// use rust_decimal_macros::dec;
/// use payroll_core::calculations::{WithholdingCalculator, WithholdingConfig};
/// use payroll_core::{Bracket, TaxBracketTable, TaxKind};
///
/// let calculator = WithholdingCalculator::new(WithholdingConfig::default()).unwrap();
/// let inss = TaxBracketTable::new(2025, TaxKind::Inss, vec![
///     Bracket::new(dec!(1412), dec!(7.5), dec!(0)),
///     Bracket::new(dec!(2666.68), dec!(9), dec!(0)),
/// ]);
///
/// assert_eq!(calculator.inss(dec!(2000), &inss), Ok(dec!(158.82)));
/// ```
#[derive(Debug, Clone)]
pub struct WithholdingCalculator {
    config: WithholdingConfig,
}

impl WithholdingCalculator {
    pub fn new(config: WithholdingConfig) -> Result<Self, WithholdingConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &WithholdingConfig {
        &self.config
    }

    pub fn inss(
        &self,
        base: Decimal,
        table: &TaxBracketTable,
    ) -> Result<Decimal, AmountOverflow> {
        inss_withholding(base, &table.brackets, self.config.inss_ceiling)
    }

    pub fn irrf(
        &self,
        base: Decimal,
        dependents: u32,
        table: &TaxBracketTable,
    ) -> Result<Decimal, AmountOverflow> {
        irrf_withholding(
            base,
            dependents,
            self.config.irrf_dependent_deduction,
            &table.brackets,
        )
    }
}

impl Default for WithholdingCalculator {
    fn default() -> Self {
        Self {
            config: WithholdingConfig::default(),
        }
    }
}

/// INSS withheld on `base` using the default ceiling.
pub fn compute_inss(
    base: Decimal,
    table: &TaxBracketTable,
) -> Result<Decimal, AmountOverflow> {
    WithholdingCalculator::default().inss(base, table)
}

/// IRRF withheld on `base` using the default per-dependent deduction.
pub fn compute_irrf(
    base: Decimal,
    dependents: u32,
    table: &TaxBracketTable,
) -> Result<Decimal, AmountOverflow> {
    WithholdingCalculator::default().irrf(base, dependents, table)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::{Bracket, TaxKind};

    fn inss_table() -> TaxBracketTable {
        TaxBracketTable::new(
            2025,
            TaxKind::Inss,
            vec![
                Bracket::new(dec!(1412), dec!(7.5), dec!(0)),
                Bracket::new(dec!(2666.68), dec!(9), dec!(21.18)),
                Bracket::new(dec!(4000.03), dec!(12), dec!(101.18)),
                Bracket::new(dec!(7786.02), dec!(14), dec!(181.18)),
            ],
        )
    }

    fn irrf_table() -> TaxBracketTable {
        TaxBracketTable::new(
            2025,
            TaxKind::Irrf,
            vec![
                Bracket::new(dec!(2112), dec!(0), dec!(0)),
                Bracket::new(dec!(2826.65), dec!(7.5), dec!(158.40)),
                Bracket::new(dec!(3751.05), dec!(15), dec!(370.40)),
                Bracket::new(dec!(4664.68), dec!(22.5), dec!(651.73)),
                Bracket::new(dec!(999999), dec!(27.5), dec!(884.96)),
            ],
        )
    }

    #[test]
    fn zero_base_short_circuits_for_both_kinds() {
        assert_eq!(compute_inss(dec!(0), &inss_table()), Ok(dec!(0)));
        assert_eq!(compute_irrf(dec!(0), 0, &irrf_table()), Ok(dec!(0)));
        assert_eq!(compute_inss(dec!(0), &irrf_table()), Ok(dec!(0)));
        assert_eq!(compute_irrf(dec!(0), 0, &inss_table()), Ok(dec!(0)));
    }

    #[test]
    fn default_functions_match_worked_examples() {
        assert_eq!(compute_inss(dec!(2000), &inss_table()), Ok(dec!(158.82)));
        assert_eq!(compute_inss(dec!(3000), &inss_table()), Ok(dec!(258.82)));
        assert_eq!(compute_irrf(dec!(3000), 0, &irrf_table()), Ok(dec!(79.60)));
    }

    #[test]
    fn ceiling_clamp_uses_configured_ceiling() {
        assert_eq!(
            compute_inss(dec!(10000), &inss_table()),
            compute_inss(dec!(7786.02), &inss_table())
        );

        let lower = WithholdingCalculator::new(WithholdingConfig {
            inss_ceiling: dec!(3000),
            ..WithholdingConfig::default()
        })
        .expect("valid config");
        assert_eq!(lower.inss(dec!(10000), &inss_table()), Ok(dec!(258.82)));
    }

    #[test]
    fn configured_dependent_deduction_is_used() {
        let calculator = WithholdingCalculator::new(WithholdingConfig {
            irrf_dependent_deduction: dec!(500),
            ..WithholdingConfig::default()
        })
        .expect("valid config");

        // 3000 − 500 = 2500 → 2500 × 7.5% − 158.40
        assert_eq!(calculator.irrf(dec!(3000), 1, &irrf_table()), Ok(dec!(29.10)));
    }

    #[test]
    fn unrepresentable_base_is_an_error_not_a_panic() {
        let huge = dec!(10000000000000000000000000000);

        assert_eq!(
            compute_irrf(huge, 0, &irrf_table()),
            Err(AmountOverflow("applying a rate"))
        );
        // INSS clamps at the ceiling first, so the same base is fine there.
        assert_eq!(compute_inss(huge, &inss_table()), compute_inss(dec!(7786.02), &inss_table()));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let result = WithholdingCalculator::new(WithholdingConfig {
            inss_ceiling: dec!(-1),
            ..WithholdingConfig::default()
        });

        assert!(matches!(
            result,
            Err(WithholdingConfigError::InvalidInssCeiling(_))
        ));
    }
}
