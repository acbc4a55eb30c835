mod employee;
mod line_item;
mod payroll_run;
mod payslip;
mod tax_table;

pub use employee::{Employee, NewEmployee};
pub use line_item::{LineItem, LineItemClass, LineItemDetail, LineItemKind, NewLineItem};
pub use payroll_run::{PayPeriod, PayrollRun};
pub use payslip::{DerivedTotals, Payslip};
pub use tax_table::{Bracket, TaxBracketTable, TaxKind, TaxTableError};
