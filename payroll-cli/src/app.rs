use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use payroll_core::calculations::WithholdingConfig;
use payroll_core::calculations::common::{AmountOverflow, checked_add};
use payroll_core::db::RepositoryRegistry;
use payroll_core::{
    DerivedTotals, NewEmployee, NewLineItem, PayrollError, PayrollRepository, PayrollRunGenerator,
    PayslipEngine, RepositoryError, TaxBracketTable, TaxKind, TaxTableProvider,
};
use payroll_data::LineItemImporter;
use payroll_db_sqlite::SqliteRepositoryFactory;
use rust_decimal::Decimal;
use tracing::debug;

use crate::cli::{
    CalcCommand, Command, EmployeesCommand, KindsCommand, PayslipCommand, PeriodsCommand,
    RunCommand, TableArgs, TablesCommand,
};
use crate::config::AppConfig;
use crate::utils::opt_display;

/// Every backend this binary links against.
pub fn build_registry() -> RepositoryRegistry {
    let mut registry = RepositoryRegistry::new();
    registry.register(Box::new(SqliteRepositoryFactory));
    registry
}

/// The engine services wired to one repository.
pub struct App {
    repo: Arc<dyn PayrollRepository>,
    tables: TaxTableProvider,
    engine: Arc<PayslipEngine>,
    generator: PayrollRunGenerator,
}

impl App {
    pub fn new(
        repo: Arc<dyn PayrollRepository>,
        withholding: WithholdingConfig,
    ) -> Result<Self> {
        let tables = TaxTableProvider::new(Arc::clone(&repo));
        let engine = Arc::new(PayslipEngine::new(
            Arc::clone(&repo),
            tables.clone(),
            withholding,
        )?);
        let generator = PayrollRunGenerator::new(Arc::clone(&repo), Arc::clone(&engine));
        Ok(Self {
            repo,
            tables,
            engine,
            generator,
        })
    }

    /// Opens the configured backend and builds the services on top of it.
    pub async fn connect(
        registry: &RepositoryRegistry,
        config: &AppConfig,
    ) -> Result<Self> {
        let db_config = config.db_config();
        let repo = registry.connect(&db_config).await.with_context(|| {
            format!(
                "cannot open {} database '{}'",
                db_config.backend, db_config.connection_string
            )
        })?;
        Self::new(repo, config.withholding()?)
    }

    pub fn repository(&self) -> &Arc<dyn PayrollRepository> {
        &self.repo
    }

    /// Runs one command, writing its report to `out`.
    pub async fn execute<W: Write>(
        &self,
        command: Command,
        out: &mut W,
    ) -> Result<()> {
        debug!(?command, "executing");
        match command {
            Command::Tables(cmd) => self.tables_command(cmd, out).await,
            Command::Kinds(KindsCommand::List) => self.list_kinds(out).await,
            Command::Employees(cmd) => self.employees_command(cmd, out).await,
            Command::Periods(cmd) => self.periods_command(cmd, out).await,
            Command::Run(cmd) => self.run_command(cmd, out).await,
            Command::Payslip(cmd) => self.payslip_command(cmd, out).await,
            Command::Calc(cmd) => self.calc_command(cmd, out).await,
        }
    }

    // ─── tables & kinds ──────────────────────────────────────────────────

    async fn tables_command<W: Write>(
        &self,
        cmd: TablesCommand,
        out: &mut W,
    ) -> Result<()> {
        match cmd {
            TablesCommand::List => {
                let tables = self.tables.list_tables().await?;
                writeln!(out, "{:<6}{:<6}{:>9}  DESCRIPTION", "YEAR", "KIND", "BRACKETS")?;
                for table in tables {
                    writeln!(
                        out,
                        "{:<6}{:<6}{:>9}  {}",
                        table.year,
                        table.kind.as_str(),
                        table.brackets.len(),
                        opt_display(table.description.as_deref())
                    )?;
                }
            }
            TablesCommand::Show(TableArgs { kind, year, exact }) => {
                let table = if exact {
                    self.tables.exact_table(kind, year).await?
                } else {
                    self.tables.resolve_table(kind, year).await?
                };
                write_table(out, &table, year)?;
            }
        }
        Ok(())
    }

    async fn list_kinds<W: Write>(
        &self,
        out: &mut W,
    ) -> Result<()> {
        let kinds = self.repo.list_line_item_kinds().await?;
        writeln!(
            out,
            "{:<18}{:<11}{:<6}{:<6}NAME",
            "CODE", "CLASS", "INSS", "IRRF"
        )?;
        for kind in kinds {
            writeln!(
                out,
                "{:<18}{:<11}{:<6}{:<6}{}",
                kind.code,
                kind.class.as_str(),
                yes_no(kind.contributes_to_inss()),
                yes_no(kind.contributes_to_irrf()),
                kind.name
            )?;
        }
        Ok(())
    }

    // ─── employees & periods ─────────────────────────────────────────────

    async fn employees_command<W: Write>(
        &self,
        cmd: EmployeesCommand,
        out: &mut W,
    ) -> Result<()> {
        match cmd {
            EmployeesCommand::Add {
                name,
                salary,
                tax_id,
            } => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    bail!("employee name must not be empty");
                }
                if salary < Decimal::ZERO {
                    bail!("salary must not be negative, got {salary}");
                }
                let employee = self
                    .repo
                    .create_employee(NewEmployee {
                        name,
                        tax_id: tax_id.filter(|t| !t.trim().is_empty()),
                        salary,
                    })
                    .await?;
                writeln!(out, "Employee {} created: {}", employee.id, employee.name)?;
            }
            EmployeesCommand::List => {
                let employees = self.repo.list_employees().await?;
                writeln!(
                    out,
                    "{:<6}{:<28}{:<16}{:>12}  ACTIVE",
                    "ID", "NAME", "TAX ID", "SALARY"
                )?;
                for e in employees {
                    writeln!(
                        out,
                        "{:<6}{:<28}{:<16}{:>12.2}  {}",
                        e.id,
                        e.name,
                        opt_display(e.tax_id.as_deref()),
                        e.salary,
                        yes_no(e.active)
                    )?;
                }
            }
            EmployeesCommand::Deactivate { id } => {
                self.set_active(id, false).await?;
                writeln!(out, "Employee {id} deactivated")?;
            }
            EmployeesCommand::Activate { id } => {
                self.set_active(id, true).await?;
                writeln!(out, "Employee {id} activated")?;
            }
        }
        Ok(())
    }

    async fn set_active(
        &self,
        id: i64,
        active: bool,
    ) -> Result<()> {
        self.repo
            .set_employee_active(id, active)
            .await
            .map_err(PayrollError::not_found("employee", id))?;
        Ok(())
    }

    async fn periods_command<W: Write>(
        &self,
        cmd: PeriodsCommand,
        out: &mut W,
    ) -> Result<()> {
        match cmd {
            PeriodsCommand::Create { year, month } => {
                let period = self.generator.create_pay_period(year, month).await?;
                writeln!(out, "Pay period {} created: {}", period.id, period)?;
            }
            PeriodsCommand::List => {
                let periods = self.repo.list_pay_periods().await?;
                writeln!(out, "{:<6}{:<10}RUN", "ID", "PERIOD")?;
                for period in periods {
                    let run = match self.repo.find_payroll_run_by_period(period.id).await? {
                        Some(run) => format!("{} ({})", run.id, open_closed(run.closed)),
                        None => "-".to_string(),
                    };
                    writeln!(out, "{:<6}{:<10}{}", period.id, period.to_string(), run)?;
                }
            }
        }
        Ok(())
    }

    // ─── runs ────────────────────────────────────────────────────────────

    async fn run_command<W: Write>(
        &self,
        cmd: RunCommand,
        out: &mut W,
    ) -> Result<()> {
        match cmd {
            RunCommand::Generate { period } => {
                let summary = self.generator.generate(period).await?;
                let gross_total = summary.gross_total()?;
                writeln!(
                    out,
                    "Run {}: {} payslips created, {} skipped, gross total {:.2}",
                    summary.run.id,
                    summary.created.len(),
                    summary.skipped.len(),
                    gross_total
                )?;
                for p in &summary.created {
                    writeln!(
                        out,
                        "  payslip {} employee {} net {:.2}",
                        p.payslip_id, p.employee_id, p.totals.net_pay
                    )?;
                }
            }
            RunCommand::Close { run } => {
                let run = self.generator.close(run).await?;
                writeln!(out, "Run {} closed", run.id)?;
            }
            RunCommand::Show { period } => self.show_run(period, out).await?,
        }
        Ok(())
    }

    async fn show_run<W: Write>(
        &self,
        pay_period_id: i64,
        out: &mut W,
    ) -> Result<()> {
        let period = self
            .repo
            .get_pay_period(pay_period_id)
            .await
            .map_err(PayrollError::not_found("pay period", pay_period_id))?;
        let run = self
            .repo
            .find_payroll_run_by_period(period.id)
            .await?
            .ok_or_else(|| anyhow!("no payroll run for period {period}"))?;
        let payslips = self.repo.list_payslips(run.id).await?;

        writeln!(out, "Run {} {} ({})", run.id, period, open_closed(run.closed))?;
        writeln!(
            out,
            "{:<8}{:<24}{:>12}{:>12}{:>12}{:>12}{:>12}",
            "PAYSLIP", "EMPLOYEE", "GROSS", "INSS", "IRRF", "DEDUCTIONS", "NET"
        )?;
        let mut total = DerivedTotals::zero();
        for payslip in payslips {
            let employee = self.repo.get_employee(payslip.employee_id).await?;
            let t = &payslip.totals;
            writeln!(
                out,
                "{:<8}{:<24}{:>12.2}{:>12.2}{:>12.2}{:>12.2}{:>12.2}",
                payslip.id,
                employee.name,
                t.gross_pay,
                t.inss_withheld,
                t.irrf_withheld,
                t.total_deductions,
                t.net_pay
            )?;
            add_to_run_total(&mut total, t).map_err(PayrollError::from)?;
        }
        writeln!(
            out,
            "{:<32}{:>12.2}{:>12.2}{:>12.2}{:>12.2}{:>12.2}",
            "TOTAL",
            total.gross_pay,
            total.inss_withheld,
            total.irrf_withheld,
            total.total_deductions,
            total.net_pay
        )?;
        Ok(())
    }

    // ─── payslips ────────────────────────────────────────────────────────

    async fn payslip_command<W: Write>(
        &self,
        cmd: PayslipCommand,
        out: &mut W,
    ) -> Result<()> {
        match cmd {
            PayslipCommand::Show { id } => self.show_payslip(id, out).await?,
            PayslipCommand::AddItem {
                id,
                kind,
                amount,
                reference,
            } => {
                let code = kind.trim().to_uppercase();
                let kind = self
                    .repo
                    .get_line_item_kind_by_code(&code)
                    .await
                    .map_err(|e| match e {
                        RepositoryError::NotFound => anyhow!("unknown line item kind '{code}'"),
                        other => other.into(),
                    })?;
                let (item, totals) = self
                    .engine
                    .add_line_item(
                        id,
                        NewLineItem {
                            kind_id: kind.id,
                            amount,
                            reference: reference.filter(|r| !r.trim().is_empty()),
                        },
                    )
                    .await?;
                writeln!(out, "Line item {} added to payslip {}", item.id, id)?;
                write_totals(out, &totals)?;
            }
            PayslipCommand::RemoveItem { line_item_id } => {
                let totals = self.engine.remove_line_item(line_item_id).await?;
                writeln!(out, "Line item {line_item_id} removed")?;
                write_totals(out, &totals)?;
            }
            PayslipCommand::Recompute { id } => {
                let totals = self.engine.recompute(id).await?;
                writeln!(out, "Payslip {id} recomputed")?;
                write_totals(out, &totals)?;
            }
            PayslipCommand::Import { run, file } => {
                let rows = LineItemImporter::parse_file(&file)
                    .with_context(|| format!("cannot read line items from '{}'", file.display()))?;
                let applied =
                    LineItemImporter::apply(self.repo.as_ref(), &self.engine, run, &rows).await?;
                writeln!(out, "Imported {applied} line items into run {run}")?;
            }
        }
        Ok(())
    }

    async fn show_payslip<W: Write>(
        &self,
        id: i64,
        out: &mut W,
    ) -> Result<()> {
        let payslip = self
            .repo
            .get_payslip(id)
            .await
            .map_err(PayrollError::not_found("payslip", id))?;
        let employee = self.repo.get_employee(payslip.employee_id).await?;
        let items = self.repo.list_line_items(id).await?;

        writeln!(
            out,
            "Payslip {} - {} (run {})",
            payslip.id, employee.name, payslip.payroll_run_id
        )?;
        writeln!(
            out,
            "{:<6}{:<18}{:<11}{:>12}  REFERENCE",
            "ITEM", "KIND", "CLASS", "AMOUNT"
        )?;
        for detail in &items {
            writeln!(
                out,
                "{:<6}{:<18}{:<11}{:>12.2}  {}",
                detail.item.id,
                detail.kind.code,
                detail.kind.class.as_str(),
                detail.item.amount,
                opt_display(detail.item.reference.as_deref())
            )?;
        }
        write_totals(out, &payslip.totals)
    }

    // ─── calculator ──────────────────────────────────────────────────────

    async fn calc_command<W: Write>(
        &self,
        cmd: CalcCommand,
        out: &mut W,
    ) -> Result<()> {
        let calculator = self.engine.calculator();
        match cmd {
            CalcCommand::Inss { base, year } => {
                let table = self.tables.resolve_table(TaxKind::Inss, year).await?;
                let amount = calculator.inss(base, &table).map_err(PayrollError::from)?;
                writeln!(
                    out,
                    "INSS on {base:.2} ({} table): {amount:.2}",
                    table.year
                )?;
            }
            CalcCommand::Irrf {
                base,
                year,
                dependents,
            } => {
                let table = self.tables.resolve_table(TaxKind::Irrf, year).await?;
                let amount = calculator
                    .irrf(base, dependents, &table)
                    .map_err(PayrollError::from)?;
                writeln!(
                    out,
                    "IRRF on {base:.2} with {dependents} dependents ({} table): {amount:.2}",
                    table.year
                )?;
            }
        }
        Ok(())
    }
}

// ─── formatting ──────────────────────────────────────────────────────────

/// Adds one payslip's reported columns to the run's TOTAL row.
fn add_to_run_total(
    total: &mut DerivedTotals,
    payslip: &DerivedTotals,
) -> Result<(), AmountOverflow> {
    total.gross_pay = checked_add(total.gross_pay, payslip.gross_pay, "totalling gross pay")?;
    total.inss_withheld =
        checked_add(total.inss_withheld, payslip.inss_withheld, "totalling INSS")?;
    total.irrf_withheld =
        checked_add(total.irrf_withheld, payslip.irrf_withheld, "totalling IRRF")?;
    total.total_deductions = checked_add(
        total.total_deductions,
        payslip.total_deductions,
        "totalling deductions",
    )?;
    total.net_pay = checked_add(total.net_pay, payslip.net_pay, "totalling net pay")?;
    Ok(())
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn open_closed(closed: bool) -> &'static str {
    if closed { "closed" } else { "open" }
}

fn write_table<W: Write>(
    out: &mut W,
    table: &TaxBracketTable,
    requested_year: i32,
) -> Result<()> {
    if table.year == requested_year {
        writeln!(out, "{} table {}", table.kind, table.year)?;
    } else {
        writeln!(
            out,
            "{} table {} (requested {})",
            table.kind, table.year, requested_year
        )?;
    }
    writeln!(out, "{:>12}{:>8}{:>12}", "UP TO", "RATE %", "DEDUCTION")?;
    for b in &table.brackets {
        writeln!(out, "{:>12.2}{:>8.2}{:>12.2}", b.up_to, b.rate, b.deduction)?;
    }
    Ok(())
}

fn write_totals<W: Write>(
    out: &mut W,
    t: &DerivedTotals,
) -> Result<()> {
    let rows = [
        ("Gross pay", t.gross_pay),
        ("Total earnings", t.total_earnings),
        ("INSS base", t.inss_base),
        ("INSS withheld", t.inss_withheld),
        ("IRRF base", t.irrf_base),
        ("IRRF withheld", t.irrf_withheld),
        ("Total deductions", t.total_deductions),
        ("Net pay", t.net_pay),
    ];
    for (label, value) in rows {
        writeln!(out, "{label:<18}{value:>12.2}")?;
    }
    Ok(())
}
