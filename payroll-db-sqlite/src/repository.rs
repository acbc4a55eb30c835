use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use payroll_core::{
    DerivedTotals, Employee, LineItem, LineItemClass, LineItemDetail, LineItemKind, NewEmployee,
    NewLineItem, PayPeriod, PayrollRepository, PayrollRun, Payslip, RepositoryError,
    TaxBracketTable, TaxKind,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Decode, Row, Sqlite, Type};
use tracing::debug;

use crate::decimal::{decimal_to_text, get_decimal};

const PAYSLIP_COLUMNS: &str = "id, payroll_run_id, employee_id, gross_pay, total_earnings,
    total_deductions, inss_base, inss_withheld, irrf_base, irrf_withheld, net_pay,
    created_at, updated_at";

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Opens `database_url`, which may be a `sqlite:` URL, a bare file path
    /// (created when missing) or `:memory:`.
    pub async fn new(database_url: &str) -> Result<Self, RepositoryError> {
        let (options, in_memory) = connect_options(database_url)
            .map_err(|e| RepositoryError::Connection(e.to_string()))?;
        // Every connection to :memory: is a separate database.
        let max_connections = if in_memory { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| {
                RepositoryError::Connection(format!(
                    "Failed to connect to database '{}': {}",
                    database_url, e
                ))
            })?;
        Ok(Self { pool })
    }

    pub async fn new_with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Load and execute all SQL seed files from the specified directory.
    /// Files are executed in alphabetical order by filename.
    pub async fn run_seeds(
        &self,
        seeds_dir: &Path,
    ) -> Result<()> {
        let mut entries: Vec<_> = std::fs::read_dir(seeds_dir)
            .with_context(|| format!("Failed to read seeds directory '{}'", seeds_dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "sql"))
            .collect();

        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let sql = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read seed file '{}'", path.display()))?;

            sqlx::raw_sql(&sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to execute seed file '{}'", path.display()))?;
            debug!(file = %path.display(), "seed applied");
        }

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn connect_options(database_url: &str) -> Result<(SqliteConnectOptions, bool), sqlx::Error> {
    let url = database_url.trim();
    let (options, in_memory) = match url {
        ":memory:" | "sqlite::memory:" => (SqliteConnectOptions::from_str("sqlite::memory:")?, true),
        _ if url.starts_with("sqlite:") => (
            SqliteConnectOptions::from_str(url)?,
            url.contains(":memory:") || url.contains("mode=memory"),
        ),
        _ => (
            SqliteConnectOptions::new()
                .filename(url)
                .create_if_missing(true),
            false,
        ),
    };
    Ok((options.foreign_keys(true), in_memory))
}

/// Maps constraint failures onto the repository vocabulary.
fn db_error(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return RepositoryError::Conflict(db.message().to_string());
        }
        if db.is_foreign_key_violation() {
            return RepositoryError::NotFound;
        }
    }
    RepositoryError::Database(e.to_string())
}

fn get<'r, T>(
    row: &'r SqliteRow,
    column: &str,
) -> Result<T, RepositoryError>
where
    T: Decode<'r, Sqlite> + Type<Sqlite>,
{
    row.try_get(column)
        .map_err(|e| RepositoryError::Database(format!("Failed to get {}: {}", column, e)))
}

fn row_to_tax_table(row: &SqliteRow) -> Result<TaxBracketTable, RepositoryError> {
    let kind_str: String = get(row, "kind")?;
    let kind = TaxKind::parse(&kind_str)
        .ok_or_else(|| RepositoryError::Database(format!("Invalid tax kind: {}", kind_str)))?;
    let brackets_json: String = get(row, "brackets")?;
    let brackets = TaxBracketTable::brackets_from_json(&brackets_json)
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

    Ok(TaxBracketTable {
        year: get(row, "year")?,
        kind,
        description: get(row, "description")?,
        brackets,
    })
}

fn kind_from_row(
    row: &SqliteRow,
    id: i64,
) -> Result<LineItemKind, RepositoryError> {
    let class_str: String = get(row, "classification")?;
    let class = LineItemClass::parse(&class_str).ok_or_else(|| {
        RepositoryError::Database(format!("Invalid classification: {}", class_str))
    })?;

    Ok(LineItemKind {
        id,
        code: get(row, "code")?,
        name: get(row, "name")?,
        class,
        counts_toward_inss_base: get(row, "counts_toward_inss_base")?,
        counts_toward_irrf_base: get(row, "counts_toward_irrf_base")?,
    })
}

fn row_to_line_item_kind(row: &SqliteRow) -> Result<LineItemKind, RepositoryError> {
    kind_from_row(row, get(row, "id")?)
}

fn row_to_employee(row: &SqliteRow) -> Result<Employee, RepositoryError> {
    Ok(Employee {
        id: get(row, "id")?,
        name: get(row, "name")?,
        tax_id: get(row, "tax_id")?,
        salary: get_decimal(row, "salary")?,
        active: get(row, "active")?,
        created_at: get(row, "created_at")?,
    })
}

fn row_to_pay_period(row: &SqliteRow) -> Result<PayPeriod, RepositoryError> {
    Ok(PayPeriod {
        id: get(row, "id")?,
        year: get(row, "year")?,
        month: get(row, "month")?,
    })
}

fn row_to_payroll_run(row: &SqliteRow) -> Result<PayrollRun, RepositoryError> {
    Ok(PayrollRun {
        id: get(row, "id")?,
        pay_period_id: get(row, "pay_period_id")?,
        closed: get(row, "closed")?,
        created_at: get(row, "created_at")?,
    })
}

fn row_to_payslip(row: &SqliteRow) -> Result<Payslip, RepositoryError> {
    Ok(Payslip {
        id: get(row, "id")?,
        payroll_run_id: get(row, "payroll_run_id")?,
        employee_id: get(row, "employee_id")?,
        totals: DerivedTotals {
            gross_pay: get_decimal(row, "gross_pay")?,
            total_earnings: get_decimal(row, "total_earnings")?,
            total_deductions: get_decimal(row, "total_deductions")?,
            inss_base: get_decimal(row, "inss_base")?,
            inss_withheld: get_decimal(row, "inss_withheld")?,
            irrf_base: get_decimal(row, "irrf_base")?,
            irrf_withheld: get_decimal(row, "irrf_withheld")?,
            net_pay: get_decimal(row, "net_pay")?,
        },
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

fn row_to_line_item(row: &SqliteRow) -> Result<LineItem, RepositoryError> {
    Ok(LineItem {
        id: get(row, "id")?,
        payslip_id: get(row, "payslip_id")?,
        kind_id: get(row, "kind_id")?,
        amount: get_decimal(row, "amount")?,
        reference: get(row, "reference")?,
        created_at: get(row, "created_at")?,
    })
}

#[async_trait]
impl PayrollRepository for SqliteRepository {
    async fn get_tax_table(
        &self,
        kind: TaxKind,
        year: i32,
    ) -> Result<TaxBracketTable, RepositoryError> {
        let row = sqlx::query(
            "SELECT year, kind, description, brackets FROM tax_tables WHERE kind = ? AND year = ?",
        )
        .bind(kind.as_str())
        .bind(year)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or(RepositoryError::NotFound)?;

        row_to_tax_table(&row)
    }

    async fn get_latest_tax_table(
        &self,
        kind: TaxKind,
    ) -> Result<TaxBracketTable, RepositoryError> {
        let row = sqlx::query(
            "SELECT year, kind, description, brackets FROM tax_tables
             WHERE kind = ? ORDER BY year DESC LIMIT 1",
        )
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or(RepositoryError::NotFound)?;

        row_to_tax_table(&row)
    }

    async fn list_tax_tables(&self) -> Result<Vec<TaxBracketTable>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT year, kind, description, brackets FROM tax_tables ORDER BY year DESC, kind ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(row_to_tax_table).collect()
    }

    async fn insert_tax_table(
        &self,
        table: &TaxBracketTable,
    ) -> Result<(), RepositoryError> {
        let brackets = table
            .brackets_json()
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        sqlx::query(
            "INSERT INTO tax_tables (year, kind, description, brackets, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(table.year)
        .bind(table.kind.as_str())
        .bind(&table.description)
        .bind(brackets)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| match db_error(e) {
            RepositoryError::Conflict(_) => RepositoryError::Conflict(format!(
                "{} table for {} already exists",
                table.kind, table.year
            )),
            other => other,
        })?;

        Ok(())
    }

    async fn get_line_item_kind(
        &self,
        id: i64,
    ) -> Result<LineItemKind, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, code, name, classification, counts_toward_inss_base, counts_toward_irrf_base
             FROM line_item_kinds WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or(RepositoryError::NotFound)?;

        row_to_line_item_kind(&row)
    }

    async fn get_line_item_kind_by_code(
        &self,
        code: &str,
    ) -> Result<LineItemKind, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, code, name, classification, counts_toward_inss_base, counts_toward_irrf_base
             FROM line_item_kinds WHERE code = ?",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or(RepositoryError::NotFound)?;

        row_to_line_item_kind(&row)
    }

    async fn list_line_item_kinds(&self) -> Result<Vec<LineItemKind>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, code, name, classification, counts_toward_inss_base, counts_toward_irrf_base
             FROM line_item_kinds ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(row_to_line_item_kind).collect()
    }

    async fn create_employee(
        &self,
        employee: NewEmployee,
    ) -> Result<Employee, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO employees (name, tax_id, salary, active, created_at)
             VALUES (?, ?, ?, 1, ?)",
        )
        .bind(&employee.name)
        .bind(&employee.tax_id)
        .bind(decimal_to_text(employee.salary))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        self.get_employee(result.last_insert_rowid()).await
    }

    async fn get_employee(
        &self,
        id: i64,
    ) -> Result<Employee, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, tax_id, salary, active, created_at FROM employees WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or(RepositoryError::NotFound)?;

        row_to_employee(&row)
    }

    async fn list_employees(&self) -> Result<Vec<Employee>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, tax_id, salary, active, created_at FROM employees ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(row_to_employee).collect()
    }

    async fn list_active_employees(&self) -> Result<Vec<Employee>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, tax_id, salary, active, created_at FROM employees
             WHERE active = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(row_to_employee).collect()
    }

    async fn set_employee_active(
        &self,
        id: i64,
        active: bool,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE employees SET active = ? WHERE id = ?")
            .bind(active)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn create_pay_period(
        &self,
        year: i32,
        month: u32,
    ) -> Result<PayPeriod, RepositoryError> {
        let result = sqlx::query("INSERT INTO pay_periods (year, month) VALUES (?, ?)")
            .bind(year)
            .bind(month)
            .execute(&self.pool)
            .await
            .map_err(|e| match db_error(e) {
                RepositoryError::Conflict(_) => RepositoryError::Conflict(format!(
                    "pay period {:02}/{} already exists",
                    month, year
                )),
                other => other,
            })?;

        Ok(PayPeriod {
            id: result.last_insert_rowid(),
            year,
            month,
        })
    }

    async fn get_pay_period(
        &self,
        id: i64,
    ) -> Result<PayPeriod, RepositoryError> {
        let row = sqlx::query("SELECT id, year, month FROM pay_periods WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .ok_or(RepositoryError::NotFound)?;

        row_to_pay_period(&row)
    }

    async fn find_pay_period(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Option<PayPeriod>, RepositoryError> {
        let row = sqlx::query("SELECT id, year, month FROM pay_periods WHERE year = ? AND month = ?")
            .bind(year)
            .bind(month)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.as_ref().map(row_to_pay_period).transpose()
    }

    async fn list_pay_periods(&self) -> Result<Vec<PayPeriod>, RepositoryError> {
        let rows =
            sqlx::query("SELECT id, year, month FROM pay_periods ORDER BY year DESC, month DESC")
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;

        rows.iter().map(row_to_pay_period).collect()
    }

    async fn create_payroll_run(
        &self,
        pay_period_id: i64,
    ) -> Result<PayrollRun, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO payroll_runs (pay_period_id, closed, created_at) VALUES (?, 0, ?)",
        )
        .bind(pay_period_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        self.get_payroll_run(result.last_insert_rowid()).await
    }

    async fn get_payroll_run(
        &self,
        id: i64,
    ) -> Result<PayrollRun, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, pay_period_id, closed, created_at FROM payroll_runs WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or(RepositoryError::NotFound)?;

        row_to_payroll_run(&row)
    }

    async fn find_payroll_run_by_period(
        &self,
        pay_period_id: i64,
    ) -> Result<Option<PayrollRun>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, pay_period_id, closed, created_at FROM payroll_runs WHERE pay_period_id = ?",
        )
        .bind(pay_period_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(row_to_payroll_run).transpose()
    }

    async fn close_payroll_run(
        &self,
        id: i64,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE payroll_runs SET closed = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn create_payslip(
        &self,
        payroll_run_id: i64,
        employee_id: i64,
    ) -> Result<Payslip, RepositoryError> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO payslips (payroll_run_id, employee_id, created_at, updated_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(payroll_run_id)
        .bind(employee_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        self.get_payslip(result.last_insert_rowid()).await
    }

    async fn get_payslip(
        &self,
        id: i64,
    ) -> Result<Payslip, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {PAYSLIP_COLUMNS} FROM payslips WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .ok_or(RepositoryError::NotFound)?;

        row_to_payslip(&row)
    }

    async fn find_payslip(
        &self,
        payroll_run_id: i64,
        employee_id: i64,
    ) -> Result<Option<Payslip>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {PAYSLIP_COLUMNS} FROM payslips WHERE payroll_run_id = ? AND employee_id = ?"
        ))
        .bind(payroll_run_id)
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(row_to_payslip).transpose()
    }

    async fn list_payslips(
        &self,
        payroll_run_id: i64,
    ) -> Result<Vec<Payslip>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PAYSLIP_COLUMNS} FROM payslips WHERE payroll_run_id = ? ORDER BY id"
        ))
        .bind(payroll_run_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(row_to_payslip).collect()
    }

    async fn update_payslip_totals(
        &self,
        payslip_id: i64,
        totals: &DerivedTotals,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE payslips SET
                gross_pay = ?, total_earnings = ?, total_deductions = ?,
                inss_base = ?, inss_withheld = ?, irrf_base = ?, irrf_withheld = ?,
                net_pay = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(decimal_to_text(totals.gross_pay))
        .bind(decimal_to_text(totals.total_earnings))
        .bind(decimal_to_text(totals.total_deductions))
        .bind(decimal_to_text(totals.inss_base))
        .bind(decimal_to_text(totals.inss_withheld))
        .bind(decimal_to_text(totals.irrf_base))
        .bind(decimal_to_text(totals.irrf_withheld))
        .bind(decimal_to_text(totals.net_pay))
        .bind(Utc::now())
        .bind(payslip_id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn add_line_item(
        &self,
        payslip_id: i64,
        item: NewLineItem,
    ) -> Result<LineItem, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO line_items (payslip_id, kind_id, amount, reference, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(payslip_id)
        .bind(item.kind_id)
        .bind(decimal_to_text(item.amount))
        .bind(&item.reference)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        self.get_line_item(result.last_insert_rowid()).await
    }

    async fn get_line_item(
        &self,
        id: i64,
    ) -> Result<LineItem, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, payslip_id, kind_id, amount, reference, created_at
             FROM line_items WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or(RepositoryError::NotFound)?;

        row_to_line_item(&row)
    }

    async fn delete_line_item(
        &self,
        id: i64,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM line_items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list_line_items(
        &self,
        payslip_id: i64,
    ) -> Result<Vec<LineItemDetail>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT li.id, li.payslip_id, li.kind_id, li.amount, li.reference, li.created_at,
                    k.code, k.name, k.classification,
                    k.counts_toward_inss_base, k.counts_toward_irrf_base
             FROM line_items li
             JOIN line_item_kinds k ON k.id = li.kind_id
             WHERE li.payslip_id = ?
             ORDER BY li.id",
        )
        .bind(payslip_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter()
            .map(|row| {
                let item = row_to_line_item(row)?;
                let kind = kind_from_row(row, item.kind_id)?;
                Ok(LineItemDetail { item, kind })
            })
            .collect()
    }
}
