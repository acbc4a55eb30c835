use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Engine-owned figures of a payslip.
///
/// Only [`crate::PayslipEngine`] produces these; storage writes them as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedTotals {
    pub gross_pay: Decimal,
    pub total_earnings: Decimal,
    pub total_deductions: Decimal,
    pub inss_base: Decimal,
    pub inss_withheld: Decimal,
    pub irrf_base: Decimal,
    pub irrf_withheld: Decimal,
    pub net_pay: Decimal,
}

impl DerivedTotals {
    pub fn zero() -> Self {
        Self {
            gross_pay: Decimal::ZERO,
            total_earnings: Decimal::ZERO,
            total_deductions: Decimal::ZERO,
            inss_base: Decimal::ZERO,
            inss_withheld: Decimal::ZERO,
            irrf_base: Decimal::ZERO,
            irrf_withheld: Decimal::ZERO,
            net_pay: Decimal::ZERO,
        }
    }
}

impl Default for DerivedTotals {
    fn default() -> Self {
        Self::zero()
    }
}

/// One employee's pay record within a payroll run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payslip {
    pub id: i64,
    pub payroll_run_id: i64,
    pub employee_id: i64,
    pub totals: DerivedTotals,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
