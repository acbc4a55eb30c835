use std::collections::BTreeMap;
use std::io::Read;

use payroll_core::{
    Bracket, PayrollRepository, RepositoryError, TaxBracketTable, TaxKind, TaxTableError,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur when loading bracket tables.
#[derive(Debug, Error)]
pub enum TaxTableLoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("unknown tax kind '{kind}' on row {row}")]
    InvalidKind { kind: String, row: usize },

    #[error("invalid table: {0}")]
    InvalidTable(#[from] TaxTableError),

    /// Stored tables are immutable; a reload must match them exactly.
    #[error("{kind} table for {year} already exists with different brackets")]
    Conflict { kind: TaxKind, year: i32 },

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<csv::Error> for TaxTableLoaderError {
    fn from(err: csv::Error) -> Self {
        TaxTableLoaderError::CsvParse(err.to_string())
    }
}

/// One bracket row of the tables CSV.
///
/// - `year`: fiscal year, e.g. 2025
/// - `kind`: `inss` or `irrf`
/// - `up_to`: upper bound of the bracket
/// - `rate`: percentage, e.g. `7.5`
/// - `deduction`: fixed deduction; empty means zero
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TaxTableRecord {
    pub year: i32,
    pub kind: String,
    pub up_to: Decimal,
    pub rate: Decimal,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub deduction: Option<Decimal>,
}

fn deserialize_optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .trim()
            .parse::<Decimal>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// What [`TaxTableLoader::load`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub inserted: usize,
    /// Tables already stored with identical brackets.
    pub unchanged: usize,
}

/// Loader for bracket tables from CSV files.
///
/// Works against any [`PayrollRepository`] backend.
pub struct TaxTableLoader;

impl TaxTableLoader {
    /// Parse bracket records from a CSV reader.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<TaxTableRecord>, TaxTableLoaderError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = Vec::new();
        for result in csv_reader.deserialize() {
            let record: TaxTableRecord = result?;
            records.push(record);
        }
        Ok(records)
    }

    /// Groups records into one validated table per `(year, kind)`, brackets
    /// ordered by `up_to`. Tables come back ordered by year, then kind.
    pub fn group(records: &[TaxTableRecord]) -> Result<Vec<TaxBracketTable>, TaxTableLoaderError> {
        let mut groups: BTreeMap<(i32, TaxKind), Vec<Bracket>> = BTreeMap::new();

        for (idx, record) in records.iter().enumerate() {
            let kind =
                TaxKind::parse(&record.kind).ok_or_else(|| TaxTableLoaderError::InvalidKind {
                    kind: record.kind.clone(),
                    row: idx + 1,
                })?;
            groups.entry((record.year, kind)).or_default().push(Bracket::new(
                record.up_to,
                record.rate,
                record.deduction.unwrap_or(Decimal::ZERO),
            ));
        }

        groups
            .into_iter()
            .map(|((year, kind), mut brackets)| {
                brackets.sort_by(|a, b| a.up_to.cmp(&b.up_to));
                let table = TaxBracketTable::new(year, kind, brackets)
                    .with_description(format!("{} {}", kind.as_str().to_uppercase(), year));
                table.validate()?;
                Ok(table)
            })
            .collect()
    }

    /// Stores each table that is not present yet.
    ///
    /// Reloading an identical table is a no-op, so running the same load
    /// twice leaves the store unchanged.
    ///
    /// # Errors
    /// [`TaxTableLoaderError::Conflict`] when a stored table differs.
    pub async fn load<R: PayrollRepository + ?Sized>(
        repo: &R,
        tables: &[TaxBracketTable],
    ) -> Result<LoadSummary, TaxTableLoaderError> {
        let mut summary = LoadSummary::default();

        for table in tables {
            match repo.get_tax_table(table.kind, table.year).await {
                Ok(existing) if existing.brackets == table.brackets => {
                    debug!(kind = %table.kind, year = table.year, "table already loaded");
                    summary.unchanged += 1;
                }
                Ok(_) => {
                    return Err(TaxTableLoaderError::Conflict {
                        kind: table.kind,
                        year: table.year,
                    });
                }
                Err(RepositoryError::NotFound) => {
                    repo.insert_tax_table(table).await?;
                    info!(
                        kind = %table.kind,
                        year = table.year,
                        brackets = table.brackets.len(),
                        "table loaded"
                    );
                    summary.inserted += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(summary)
    }
}
