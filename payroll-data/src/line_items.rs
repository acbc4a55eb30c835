//! CSV import of line items into an existing payroll run.
//!
//! ## CSV Format
//!
//! | Column        | Required | Type    | Notes                                   |
//! |---------------|----------|---------|-----------------------------------------|
//! | `employee_id` | yes      | integer | Employee with a payslip in the run      |
//! | `kind_code`   | yes      | string  | Catalog code, e.g. `HE`, `BONUS`, `VT`  |
//! | `amount`      | yes      | decimal | Non-negative, e.g. `450.00`             |
//! | `reference`   | no       | string  | Free text; leave empty for none         |
//!
//! ```csv
//! employee_id,kind_code,amount,reference
//! 1,HE,450.00,10h extras
//! 2,VT,180.00,
//! ```

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use payroll_core::{
    NewLineItem, PayrollError, PayrollRepository, PayslipEngine, RepositoryError,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

/// One row of the import file. `row` numbers in errors are 1-based, header
/// excluded.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LineItemRow {
    pub employee_id: i64,
    pub kind_code: String,
    pub amount: Decimal,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Error)]
pub enum LineItemImportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parse error: {0}")]
    Parse(#[from] csv::Error),

    #[error("negative amount {amount} on row {row}")]
    NegativeAmount { amount: Decimal, row: usize },

    #[error("unknown line item kind '{code}' on row {row}")]
    UnknownKind { code: String, row: usize },

    #[error("unknown employee {employee_id} on row {row}")]
    UnknownEmployee { employee_id: i64, row: usize },

    #[error("employee {employee_id} has no payslip in run {run_id} (row {row})")]
    MissingPayslip {
        employee_id: i64,
        run_id: i64,
        row: usize,
    },

    #[error("row {row}: {source}")]
    Engine {
        row: usize,
        #[source]
        source: PayrollError,
    },

    #[error(transparent)]
    Payroll(#[from] PayrollError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

pub struct LineItemImporter;

impl LineItemImporter {
    /// Parses and checks every row. Kind codes are normalised to upper case.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<LineItemRow>, LineItemImportError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .flexible(false)
            .from_reader(reader);

        reader
            .deserialize::<LineItemRow>()
            .enumerate()
            .map(|(idx, result)| {
                let mut row = result?;
                if row.amount < Decimal::ZERO {
                    return Err(LineItemImportError::NegativeAmount {
                        amount: row.amount,
                        row: idx + 1,
                    });
                }
                row.kind_code = row.kind_code.to_uppercase();
                row.reference = row.reference.filter(|r| !r.is_empty());
                Ok(row)
            })
            .collect()
    }

    pub fn parse_file(path: &Path) -> Result<Vec<LineItemRow>, LineItemImportError> {
        let file = std::fs::File::open(path)?;
        Self::parse(file)
    }

    /// Adds every row to its employee's payslip in `run_id` through the
    /// engine, so each payslip is recomputed after each item.
    ///
    /// All rows are resolved before the first insert; a bad row leaves the
    /// run untouched. Returns the number of items added.
    pub async fn apply<R: PayrollRepository + ?Sized>(
        repo: &R,
        engine: &PayslipEngine,
        run_id: i64,
        rows: &[LineItemRow],
    ) -> Result<usize, LineItemImportError> {
        let run = repo
            .get_payroll_run(run_id)
            .await
            .map_err(PayrollError::not_found("payroll run", run_id))?;
        if run.closed {
            return Err(PayrollError::RunClosed(run.id).into());
        }

        let mut kinds: HashMap<&str, i64> = HashMap::new();
        let mut resolved = Vec::with_capacity(rows.len());

        for (idx, row) in rows.iter().enumerate() {
            let row_number = idx + 1;

            let kind_id = match kinds.get(row.kind_code.as_str()) {
                Some(id) => *id,
                None => {
                    let kind = repo
                        .get_line_item_kind_by_code(&row.kind_code)
                        .await
                        .map_err(|e| match e {
                            RepositoryError::NotFound => LineItemImportError::UnknownKind {
                                code: row.kind_code.clone(),
                                row: row_number,
                            },
                            other => other.into(),
                        })?;
                    kinds.insert(row.kind_code.as_str(), kind.id);
                    kind.id
                }
            };

            repo.get_employee(row.employee_id)
                .await
                .map_err(|e| match e {
                    RepositoryError::NotFound => LineItemImportError::UnknownEmployee {
                        employee_id: row.employee_id,
                        row: row_number,
                    },
                    other => other.into(),
                })?;

            let payslip = repo
                .find_payslip(run.id, row.employee_id)
                .await?
                .ok_or(LineItemImportError::MissingPayslip {
                    employee_id: row.employee_id,
                    run_id: run.id,
                    row: row_number,
                })?;

            resolved.push((
                row_number,
                payslip.id,
                NewLineItem {
                    kind_id,
                    amount: row.amount,
                    reference: row.reference.clone(),
                },
            ));
        }

        let applied = resolved.len();
        for (row, payslip_id, item) in resolved {
            engine
                .add_line_item(payslip_id, item)
                .await
                .map_err(|source| LineItemImportError::Engine { row, source })?;
        }

        info!(run_id = run.id, applied, "line items imported");
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_parse_rows_in_file_order() {
        let rows = LineItemImporter::parse(
            "employee_id,kind_code,amount,reference\n1,he,450.00,10h extras\n2,VT,180,\n".as_bytes(),
        )
        .expect("valid CSV");

        assert_eq!(
            rows,
            vec![
                LineItemRow {
                    employee_id: 1,
                    kind_code: "HE".to_string(),
                    amount: dec!(450.00),
                    reference: Some("10h extras".to_string()),
                },
                LineItemRow {
                    employee_id: 2,
                    kind_code: "VT".to_string(),
                    amount: dec!(180),
                    reference: None,
                },
            ]
        );
    }

    #[test]
    fn test_reference_column_is_optional() {
        let rows =
            LineItemImporter::parse("employee_id,kind_code,amount\n3,BONUS,99.90\n".as_bytes())
                .expect("valid CSV");

        assert_eq!(rows[0].reference, None);
        assert_eq!(rows[0].amount, dec!(99.90));
    }

    #[test]
    fn test_negative_amount_reports_row() {
        let result = LineItemImporter::parse(
            "employee_id,kind_code,amount,reference\n1,HE,10,\n1,HE,-5,\n".as_bytes(),
        );

        assert!(matches!(
            result,
            Err(LineItemImportError::NegativeAmount { row: 2, .. })
        ));
    }

    #[test]
    fn test_non_numeric_amount_is_parse_error() {
        let result = LineItemImporter::parse(
            "employee_id,kind_code,amount,reference\n1,HE,ten,\n".as_bytes(),
        );

        assert!(matches!(result, Err(LineItemImportError::Parse(_))));
    }

    #[test]
    fn test_missing_required_column_is_parse_error() {
        let result = LineItemImporter::parse("employee_id,amount\n1,10\n".as_bytes());

        assert!(matches!(result, Err(LineItemImportError::Parse(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = LineItemImporter::parse_file(Path::new("does/not/exist.csv"));

        assert!(matches!(result, Err(LineItemImportError::Io(_))));
    }
}
