use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use payroll_core::TaxKind;
use rust_decimal::Decimal;

use crate::utils::{parse_money, parse_tax_kind};

/// Payroll bookkeeping: line items, INSS/IRRF withholding and net pay.
///
/// Money arguments accept `1234.56`, `1,234.56` and `1.234,56`.
#[derive(Parser, Debug)]
#[command(name = "payroll", version, about, long_about = None)]
pub struct Cli {
    /// TOML settings file (default: ./payroll.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Storage backend name, e.g. "sqlite"
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// Backend connection string, e.g. "payroll.db" or ":memory:"
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// Log level or EnvFilter directive; RUST_LOG takes precedence
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// INSS/IRRF bracket tables
    #[command(subcommand)]
    Tables(TablesCommand),

    /// Line item kind catalog
    #[command(subcommand)]
    Kinds(KindsCommand),

    #[command(subcommand)]
    Employees(EmployeesCommand),

    /// Monthly pay periods
    #[command(subcommand)]
    Periods(PeriodsCommand),

    /// Payroll runs
    #[command(subcommand)]
    Run(RunCommand),

    #[command(subcommand)]
    Payslip(PayslipCommand),

    /// Withholding for a single base, without touching payslips
    #[command(subcommand)]
    Calc(CalcCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum TablesCommand {
    /// Every stored table
    List,
    /// The table applied to a year, after fallback to the latest one
    Show(TableArgs),
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct TableArgs {
    #[arg(long, value_parser = parse_tax_kind)]
    pub kind: TaxKind,
    #[arg(long)]
    pub year: i32,
    /// Only the table stored for exactly this year
    #[arg(long)]
    pub exact: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum KindsCommand {
    List,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum EmployeesCommand {
    Add {
        #[arg(long)]
        name: String,
        /// Monthly base salary
        #[arg(long, value_parser = parse_money)]
        salary: Decimal,
        /// CPF
        #[arg(long)]
        tax_id: Option<String>,
    },
    List,
    /// Exclude from future payroll runs
    Deactivate { id: i64 },
    Activate { id: i64 },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum PeriodsCommand {
    Create {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
    },
    List,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum RunCommand {
    /// Create the period's run and a payslip for every active employee
    Generate {
        #[arg(long)]
        period: i64,
    },
    Close {
        #[arg(long)]
        run: i64,
    },
    Show {
        #[arg(long)]
        period: i64,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum PayslipCommand {
    Show { id: i64 },
    AddItem {
        id: i64,
        /// Line item kind code, e.g. HE or VT
        #[arg(long)]
        kind: String,
        #[arg(long, value_parser = parse_money)]
        amount: Decimal,
        #[arg(long)]
        reference: Option<String>,
    },
    RemoveItem { line_item_id: i64 },
    Recompute { id: i64 },
    /// Add line items from a CSV file (employee_id,kind_code,amount,reference)
    Import {
        #[arg(long)]
        run: i64,
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CalcCommand {
    Inss {
        #[arg(long, value_parser = parse_money)]
        base: Decimal,
        #[arg(long)]
        year: i32,
    },
    Irrf {
        #[arg(long, value_parser = parse_money)]
        base: Decimal,
        #[arg(long)]
        year: i32,
        #[arg(long, default_value_t = 0)]
        dependents: u32,
    },
}
