use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    DerivedTotals, Employee, LineItem, LineItemDetail, LineItemKind, NewEmployee, NewLineItem,
    PayPeriod, PayrollRun, Payslip, TaxBracketTable, TaxKind,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Storage handle shared by the table provider, the engine and the loaders.
///
/// Implementations are constructed by the process entry point and injected;
/// the engine never opens connections itself.
#[async_trait]
pub trait PayrollRepository: Send + Sync {
    // Tax tables
    async fn get_tax_table(
        &self,
        kind: TaxKind,
        year: i32,
    ) -> Result<TaxBracketTable, RepositoryError>;
    /// The table of `kind` with the greatest year.
    async fn get_latest_tax_table(&self, kind: TaxKind) -> Result<TaxBracketTable, RepositoryError>;
    async fn list_tax_tables(&self) -> Result<Vec<TaxBracketTable>, RepositoryError>;
    /// Fails with [`RepositoryError::Conflict`] if `(year, kind)` already exists.
    async fn insert_tax_table(&self, table: &TaxBracketTable) -> Result<(), RepositoryError>;

    // Line item catalog
    async fn get_line_item_kind(&self, id: i64) -> Result<LineItemKind, RepositoryError>;
    async fn get_line_item_kind_by_code(&self, code: &str) -> Result<LineItemKind, RepositoryError>;
    async fn list_line_item_kinds(&self) -> Result<Vec<LineItemKind>, RepositoryError>;

    // Employees
    async fn create_employee(&self, employee: NewEmployee) -> Result<Employee, RepositoryError>;
    async fn get_employee(&self, id: i64) -> Result<Employee, RepositoryError>;
    async fn list_employees(&self) -> Result<Vec<Employee>, RepositoryError>;
    async fn list_active_employees(&self) -> Result<Vec<Employee>, RepositoryError>;
    async fn set_employee_active(&self, id: i64, active: bool) -> Result<(), RepositoryError>;

    // Pay periods
    async fn create_pay_period(&self, year: i32, month: u32) -> Result<PayPeriod, RepositoryError>;
    async fn get_pay_period(&self, id: i64) -> Result<PayPeriod, RepositoryError>;
    async fn find_pay_period(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Option<PayPeriod>, RepositoryError>;
    async fn list_pay_periods(&self) -> Result<Vec<PayPeriod>, RepositoryError>;

    // Payroll runs
    async fn create_payroll_run(&self, pay_period_id: i64) -> Result<PayrollRun, RepositoryError>;
    async fn get_payroll_run(&self, id: i64) -> Result<PayrollRun, RepositoryError>;
    async fn find_payroll_run_by_period(
        &self,
        pay_period_id: i64,
    ) -> Result<Option<PayrollRun>, RepositoryError>;
    async fn close_payroll_run(&self, id: i64) -> Result<(), RepositoryError>;

    // Payslips
    async fn create_payslip(
        &self,
        payroll_run_id: i64,
        employee_id: i64,
    ) -> Result<Payslip, RepositoryError>;
    async fn get_payslip(&self, id: i64) -> Result<Payslip, RepositoryError>;
    async fn find_payslip(
        &self,
        payroll_run_id: i64,
        employee_id: i64,
    ) -> Result<Option<Payslip>, RepositoryError>;
    async fn list_payslips(&self, payroll_run_id: i64) -> Result<Vec<Payslip>, RepositoryError>;
    /// Writes every derived field in one statement.
    async fn update_payslip_totals(
        &self,
        payslip_id: i64,
        totals: &DerivedTotals,
    ) -> Result<(), RepositoryError>;

    // Line items
    async fn add_line_item(
        &self,
        payslip_id: i64,
        item: NewLineItem,
    ) -> Result<LineItem, RepositoryError>;
    async fn get_line_item(&self, id: i64) -> Result<LineItem, RepositoryError>;
    async fn delete_line_item(&self, id: i64) -> Result<(), RepositoryError>;
    async fn list_line_items(&self, payslip_id: i64) -> Result<Vec<LineItemDetail>, RepositoryError>;
}
