//! In-memory [`PayrollRepository`] used by the unit tests of this crate.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use super::repository::{PayrollRepository, RepositoryError};
use crate::models::{
    DerivedTotals, Employee, LineItem, LineItemClass, LineItemDetail, LineItemKind, NewEmployee,
    NewLineItem, PayPeriod, PayrollRun, Payslip, TaxBracketTable, TaxKind,
};

#[derive(Default)]
struct State {
    next_id: i64,
    tables: BTreeMap<(TaxKind, i32), TaxBracketTable>,
    kinds: BTreeMap<i64, LineItemKind>,
    employees: BTreeMap<i64, Employee>,
    periods: BTreeMap<i64, PayPeriod>,
    runs: BTreeMap<i64, PayrollRun>,
    payslips: BTreeMap<i64, Payslip>,
    items: BTreeMap<i64, LineItem>,
    totals_writes: usize,
}

impl State {
    fn id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

pub struct MemoryRepository {
    state: Mutex<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// Adds a catalog kind and returns its id.
    pub fn add_kind(
        &self,
        code: &str,
        class: LineItemClass,
        counts_toward_inss_base: bool,
        counts_toward_irrf_base: bool,
    ) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = state.id();
        state.kinds.insert(
            id,
            LineItemKind {
                id,
                code: code.to_string(),
                name: code.to_string(),
                class,
                counts_toward_inss_base,
                counts_toward_irrf_base,
            },
        );
        id
    }

    /// Bypasses validation so tests can plant corrupt rows.
    pub fn force_line_item_amount(
        &self,
        id: i64,
        amount: Decimal,
    ) {
        if let Some(item) = self.state.lock().unwrap().items.get_mut(&id) {
            item.amount = amount;
        }
    }

    /// Number of `update_payslip_totals` calls seen so far.
    pub fn totals_writes(&self) -> usize {
        self.state.lock().unwrap().totals_writes
    }
}

#[async_trait]
impl PayrollRepository for MemoryRepository {
    async fn get_tax_table(
        &self,
        kind: TaxKind,
        year: i32,
    ) -> Result<TaxBracketTable, RepositoryError> {
        let state = self.state.lock().unwrap();
        state
            .tables
            .get(&(kind, year))
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn get_latest_tax_table(
        &self,
        kind: TaxKind,
    ) -> Result<TaxBracketTable, RepositoryError> {
        let state = self.state.lock().unwrap();
        state
            .tables
            .values()
            .filter(|t| t.kind == kind)
            .max_by_key(|t| t.year)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn list_tax_tables(&self) -> Result<Vec<TaxBracketTable>, RepositoryError> {
        let state = self.state.lock().unwrap();
        let mut tables: Vec<_> = state.tables.values().cloned().collect();
        tables.sort_by(|a, b| b.year.cmp(&a.year).then(a.kind.cmp(&b.kind)));
        Ok(tables)
    }

    async fn insert_tax_table(
        &self,
        table: &TaxBracketTable,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let key = (table.kind, table.year);
        if state.tables.contains_key(&key) {
            return Err(RepositoryError::Conflict(format!(
                "{} table for {} already exists",
                table.kind, table.year
            )));
        }
        state.tables.insert(key, table.clone());
        Ok(())
    }

    async fn get_line_item_kind(
        &self,
        id: i64,
    ) -> Result<LineItemKind, RepositoryError> {
        let state = self.state.lock().unwrap();
        state.kinds.get(&id).cloned().ok_or(RepositoryError::NotFound)
    }

    async fn get_line_item_kind_by_code(
        &self,
        code: &str,
    ) -> Result<LineItemKind, RepositoryError> {
        let state = self.state.lock().unwrap();
        state
            .kinds
            .values()
            .find(|k| k.code == code)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn list_line_item_kinds(&self) -> Result<Vec<LineItemKind>, RepositoryError> {
        Ok(self.state.lock().unwrap().kinds.values().cloned().collect())
    }

    async fn create_employee(
        &self,
        employee: NewEmployee,
    ) -> Result<Employee, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let id = state.id();
        let created = Employee {
            id,
            name: employee.name,
            tax_id: employee.tax_id,
            salary: employee.salary,
            active: true,
            created_at: Utc::now(),
        };
        state.employees.insert(id, created.clone());
        Ok(created)
    }

    async fn get_employee(
        &self,
        id: i64,
    ) -> Result<Employee, RepositoryError> {
        let state = self.state.lock().unwrap();
        state.employees.get(&id).cloned().ok_or(RepositoryError::NotFound)
    }

    async fn list_employees(&self) -> Result<Vec<Employee>, RepositoryError> {
        Ok(self.state.lock().unwrap().employees.values().cloned().collect())
    }

    async fn list_active_employees(&self) -> Result<Vec<Employee>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .employees
            .values()
            .filter(|e| e.active)
            .cloned()
            .collect())
    }

    async fn set_employee_active(
        &self,
        id: i64,
        active: bool,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let employee = state.employees.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        employee.active = active;
        Ok(())
    }

    async fn create_pay_period(
        &self,
        year: i32,
        month: u32,
    ) -> Result<PayPeriod, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if state
            .periods
            .values()
            .any(|p| p.year == year && p.month == month)
        {
            return Err(RepositoryError::Conflict(format!(
                "pay period {month:02}/{year} already exists"
            )));
        }
        let id = state.id();
        let period = PayPeriod { id, year, month };
        state.periods.insert(id, period.clone());
        Ok(period)
    }

    async fn get_pay_period(
        &self,
        id: i64,
    ) -> Result<PayPeriod, RepositoryError> {
        let state = self.state.lock().unwrap();
        state.periods.get(&id).cloned().ok_or(RepositoryError::NotFound)
    }

    async fn find_pay_period(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Option<PayPeriod>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .periods
            .values()
            .find(|p| p.year == year && p.month == month)
            .cloned())
    }

    async fn list_pay_periods(&self) -> Result<Vec<PayPeriod>, RepositoryError> {
        Ok(self.state.lock().unwrap().periods.values().cloned().collect())
    }

    async fn create_payroll_run(
        &self,
        pay_period_id: i64,
    ) -> Result<PayrollRun, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if !state.periods.contains_key(&pay_period_id) {
            return Err(RepositoryError::NotFound);
        }
        let id = state.id();
        let run = PayrollRun {
            id,
            pay_period_id,
            closed: false,
            created_at: Utc::now(),
        };
        state.runs.insert(id, run.clone());
        Ok(run)
    }

    async fn get_payroll_run(
        &self,
        id: i64,
    ) -> Result<PayrollRun, RepositoryError> {
        let state = self.state.lock().unwrap();
        state.runs.get(&id).cloned().ok_or(RepositoryError::NotFound)
    }

    async fn find_payroll_run_by_period(
        &self,
        pay_period_id: i64,
    ) -> Result<Option<PayrollRun>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .runs
            .values()
            .find(|r| r.pay_period_id == pay_period_id)
            .cloned())
    }

    async fn close_payroll_run(
        &self,
        id: i64,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let run = state.runs.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        run.closed = true;
        Ok(())
    }

    async fn create_payslip(
        &self,
        payroll_run_id: i64,
        employee_id: i64,
    ) -> Result<Payslip, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let id = state.id();
        let now = Utc::now();
        let payslip = Payslip {
            id,
            payroll_run_id,
            employee_id,
            totals: DerivedTotals::zero(),
            created_at: now,
            updated_at: now,
        };
        state.payslips.insert(id, payslip.clone());
        Ok(payslip)
    }

    async fn get_payslip(
        &self,
        id: i64,
    ) -> Result<Payslip, RepositoryError> {
        let state = self.state.lock().unwrap();
        state.payslips.get(&id).cloned().ok_or(RepositoryError::NotFound)
    }

    async fn find_payslip(
        &self,
        payroll_run_id: i64,
        employee_id: i64,
    ) -> Result<Option<Payslip>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .payslips
            .values()
            .find(|p| p.payroll_run_id == payroll_run_id && p.employee_id == employee_id)
            .cloned())
    }

    async fn list_payslips(
        &self,
        payroll_run_id: i64,
    ) -> Result<Vec<Payslip>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .payslips
            .values()
            .filter(|p| p.payroll_run_id == payroll_run_id)
            .cloned()
            .collect())
    }

    async fn update_payslip_totals(
        &self,
        payslip_id: i64,
        totals: &DerivedTotals,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let payslip = state
            .payslips
            .get_mut(&payslip_id)
            .ok_or(RepositoryError::NotFound)?;
        payslip.totals = totals.clone();
        payslip.updated_at = Utc::now();
        state.totals_writes += 1;
        Ok(())
    }

    async fn add_line_item(
        &self,
        payslip_id: i64,
        item: NewLineItem,
    ) -> Result<LineItem, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if !state.payslips.contains_key(&payslip_id) || !state.kinds.contains_key(&item.kind_id) {
            return Err(RepositoryError::NotFound);
        }
        let id = state.id();
        let created = LineItem {
            id,
            payslip_id,
            kind_id: item.kind_id,
            amount: item.amount,
            reference: item.reference,
            created_at: Utc::now(),
        };
        state.items.insert(id, created.clone());
        Ok(created)
    }

    async fn get_line_item(
        &self,
        id: i64,
    ) -> Result<LineItem, RepositoryError> {
        let state = self.state.lock().unwrap();
        state.items.get(&id).cloned().ok_or(RepositoryError::NotFound)
    }

    async fn delete_line_item(
        &self,
        id: i64,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        state
            .items
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    async fn list_line_items(
        &self,
        payslip_id: i64,
    ) -> Result<Vec<LineItemDetail>, RepositoryError> {
        let state = self.state.lock().unwrap();
        state
            .items
            .values()
            .filter(|i| i.payslip_id == payslip_id)
            .map(|item| {
                let kind = state
                    .kinds
                    .get(&item.kind_id)
                    .cloned()
                    .ok_or(RepositoryError::NotFound)?;
                Ok(LineItemDetail {
                    item: item.clone(),
                    kind,
                })
            })
            .collect()
    }
}
