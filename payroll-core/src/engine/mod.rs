//! Services that keep payslip totals consistent with their line items.

mod locks;
pub mod recompute;
pub mod run_generator;
pub mod tax_tables;

pub use recompute::{PayslipBases, PayslipEngine};
pub use run_generator::{BASE_SALARY_REFERENCE, GeneratedPayslip, PayrollRunGenerator, RunSummary};
pub use tax_tables::TaxTableProvider;
