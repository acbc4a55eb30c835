use std::fmt::Display;

use payroll_core::RepositoryError;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, TypeInfo, ValueRef};

fn money_error(
    column: &str,
    detail: impl Display,
) -> RepositoryError {
    RepositoryError::Database(format!("money column '{column}': {detail}"))
}

/// Reads a money column.
///
/// Money is written as TEXT so no cents are lost; INTEGER and REAL cells
/// (rows edited by hand) are accepted too, REAL rounded to cents. NULL reads
/// as zero, matching the `'0'` column defaults.
pub fn get_decimal(
    row: &SqliteRow,
    column: &str,
) -> Result<Decimal, RepositoryError> {
    let raw = row.try_get_raw(column).map_err(|e| money_error(column, e))?;
    if raw.is_null() {
        return Ok(Decimal::ZERO);
    }
    let storage = raw.type_info().name().to_string();

    match storage.as_str() {
        "TEXT" => {
            let text: &str = row.try_get(column).map_err(|e| money_error(column, e))?;
            text.trim()
                .parse::<Decimal>()
                .map_err(|e| money_error(column, format_args!("'{text}' is not a decimal ({e})")))
        }
        "INTEGER" => row
            .try_get::<i64, _>(column)
            .map(Decimal::from)
            .map_err(|e| money_error(column, e)),
        "REAL" => {
            let value: f64 = row.try_get(column).map_err(|e| money_error(column, e))?;
            Decimal::try_from(value)
                .map(|d| d.round_dp(2))
                .map_err(|e| money_error(column, format_args!("{value} out of range ({e})")))
        }
        other => Err(money_error(column, format_args!("unsupported storage class {other}"))),
    }
}

/// Text written to money columns. Keeps the scale, so `79.60` stays `79.60`.
pub fn decimal_to_text(d: Decimal) -> String {
    d.to_string()
}
