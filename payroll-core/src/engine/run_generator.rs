use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::recompute::PayslipEngine;
use crate::calculations::common::checked_sum;
use crate::db::{PayrollRepository, RepositoryError};
use crate::error::{PayrollError, PayrollResult};
use crate::models::{DerivedTotals, LineItemKind, NewLineItem, PayPeriod, PayrollRun};

/// Reference text of the seeded base-salary line item.
pub const BASE_SALARY_REFERENCE: &str = "Salário base";

/// A payslip created by [`PayrollRunGenerator::generate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedPayslip {
    pub payslip_id: i64,
    pub employee_id: i64,
    pub totals: DerivedTotals,
}

/// Outcome of generating a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run: PayrollRun,
    pub created: Vec<GeneratedPayslip>,
    /// Employees that already had a payslip in the run.
    pub skipped: Vec<i64>,
}

impl RunSummary {
    /// Gross pay summed over the payslips this call created.
    pub fn gross_total(&self) -> PayrollResult<Decimal> {
        let total = checked_sum(
            self.created.iter().map(|p| p.totals.gross_pay),
            "summing run gross pay",
        )?;
        Ok(total)
    }
}

/// Creates payroll runs and seeds one payslip per active employee.
pub struct PayrollRunGenerator {
    repo: Arc<dyn PayrollRepository>,
    engine: Arc<PayslipEngine>,
}

impl PayrollRunGenerator {
    pub fn new(
        repo: Arc<dyn PayrollRepository>,
        engine: Arc<PayslipEngine>,
    ) -> Self {
        Self { repo, engine }
    }

    /// Registers a pay period after checking the month.
    pub async fn create_pay_period(
        &self,
        year: i32,
        month: u32,
    ) -> PayrollResult<PayPeriod> {
        if !PayPeriod::is_valid_month(month) {
            return Err(PayrollError::Validation(format!(
                "month must be between 1 and 12, got {month}"
            )));
        }
        let period = self.repo.create_pay_period(year, month).await?;
        info!(pay_period_id = period.id, %period, "pay period created");
        Ok(period)
    }

    /// Ensures a run exists for `pay_period_id` and gives every active
    /// employee without a payslip in it a new payslip holding one base-salary
    /// line item. Employees already covered are skipped, so repeating the
    /// call is harmless.
    ///
    /// # Errors
    /// * [`PayrollError::NotFound`] for an unknown pay period.
    /// * [`PayrollError::RunClosed`] when the period's run is closed.
    /// * [`PayrollError::MissingLineItemKind`] without a `SALARIO` kind.
    #[instrument(skip(self))]
    pub async fn generate(
        &self,
        pay_period_id: i64,
    ) -> PayrollResult<RunSummary> {
        let period = self
            .repo
            .get_pay_period(pay_period_id)
            .await
            .map_err(PayrollError::not_found("pay period", pay_period_id))?;

        let run = self.run_for_period(period.id).await?;
        if run.closed {
            return Err(PayrollError::RunClosed(run.id));
        }

        let salary_kind = self
            .repo
            .get_line_item_kind_by_code(LineItemKind::BASE_SALARY_CODE)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => {
                    PayrollError::MissingLineItemKind(LineItemKind::BASE_SALARY_CODE.to_string())
                }
                other => PayrollError::Repository(other),
            })?;

        let employees = self.repo.list_active_employees().await?;
        let mut created = Vec::new();
        let mut skipped = Vec::new();

        for employee in employees {
            if self.repo.find_payslip(run.id, employee.id).await?.is_some() {
                debug!(employee_id = employee.id, "payslip already present; skipping");
                skipped.push(employee.id);
                continue;
            }

            let payslip = self.repo.create_payslip(run.id, employee.id).await?;
            let (_, totals) = self
                .engine
                .add_line_item(
                    payslip.id,
                    NewLineItem {
                        kind_id: salary_kind.id,
                        amount: employee.salary,
                        reference: Some(BASE_SALARY_REFERENCE.to_string()),
                    },
                )
                .await?;
            created.push(GeneratedPayslip {
                payslip_id: payslip.id,
                employee_id: employee.id,
                totals,
            });
        }

        if created.is_empty() && skipped.is_empty() {
            warn!(run_id = run.id, "no active employees; run has no payslips");
        }
        info!(
            run_id = run.id,
            %period,
            created = created.len(),
            skipped = skipped.len(),
            "payroll run generated"
        );
        Ok(RunSummary {
            run,
            created,
            skipped,
        })
    }

    /// Marks a run closed. Closing an already closed run is a no-op.
    #[instrument(skip(self))]
    pub async fn close(
        &self,
        run_id: i64,
    ) -> PayrollResult<PayrollRun> {
        let run = self
            .repo
            .get_payroll_run(run_id)
            .await
            .map_err(PayrollError::not_found("payroll run", run_id))?;
        if run.closed {
            debug!("run already closed");
            return Ok(run);
        }

        self.repo
            .close_payroll_run(run_id)
            .await
            .map_err(PayrollError::not_found("payroll run", run_id))?;
        info!("payroll run closed");
        Ok(PayrollRun {
            closed: true,
            ..run
        })
    }

    async fn run_for_period(
        &self,
        pay_period_id: i64,
    ) -> PayrollResult<PayrollRun> {
        if let Some(run) = self.repo.find_payroll_run_by_period(pay_period_id).await? {
            return Ok(run);
        }
        let run = self.repo.create_payroll_run(pay_period_id).await?;
        debug!(run_id = run.id, "payroll run created");
        Ok(run)
    }
}
