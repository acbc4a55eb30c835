//! Payroll bookkeeping core.
//!
//! Line items (earnings and deductions) accumulate on each employee's
//! payslip for a pay period. After every mutation the [`PayslipEngine`]
//! re-derives the INSS and IRRF bases, applies the year's bracket tables and
//! persists the resulting totals in a single write.

pub mod calculations;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;

pub use db::repository::{PayrollRepository, RepositoryError};
pub use engine::{
    GeneratedPayslip, PayrollRunGenerator, PayslipBases, PayslipEngine, RunSummary, TaxTableProvider,
};
pub use error::{PayrollError, PayrollResult};
pub use models::*;
