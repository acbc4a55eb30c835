use std::sync::Arc;

use tracing::{debug, warn};

use crate::db::{PayrollRepository, RepositoryError};
use crate::error::{PayrollError, PayrollResult};
use crate::models::{TaxBracketTable, TaxKind};

/// Resolves the bracket table that applies to a fiscal year.
///
/// Read-only; clones share the same storage handle and need no locking.
#[derive(Clone)]
pub struct TaxTableProvider {
    repo: Arc<dyn PayrollRepository>,
}

impl TaxTableProvider {
    pub fn new(repo: Arc<dyn PayrollRepository>) -> Self {
        Self { repo }
    }

    /// The table for `(kind, year)`, or the most recent table of `kind` when
    /// that year has none.
    ///
    /// # Errors
    /// * [`PayrollError::Configuration`] when no table of `kind` exists at all.
    /// * [`PayrollError::Validation`] when the stored table is malformed.
    pub async fn resolve_table(
        &self,
        kind: TaxKind,
        year: i32,
    ) -> PayrollResult<TaxBracketTable> {
        let table = match self.repo.get_tax_table(kind, year).await {
            Ok(table) => table,
            Err(RepositoryError::NotFound) => {
                let fallback = self
                    .repo
                    .get_latest_tax_table(kind)
                    .await
                    .map_err(|e| match e {
                        RepositoryError::NotFound => PayrollError::Configuration { kind, year },
                        other => PayrollError::Repository(other),
                    })?;
                warn!(
                    %kind,
                    requested_year = year,
                    fallback_year = fallback.year,
                    "no tax table for requested year; using most recent"
                );
                fallback
            }
            Err(other) => return Err(other.into()),
        };

        table.validate()?;
        debug!(%kind, year = table.year, brackets = table.brackets.len(), "resolved tax table");
        Ok(table)
    }

    /// The table for exactly `(kind, year)`, without fallback.
    pub async fn exact_table(
        &self,
        kind: TaxKind,
        year: i32,
    ) -> PayrollResult<TaxBracketTable> {
        self.repo
            .get_tax_table(kind, year)
            .await
            .map_err(PayrollError::not_found("tax table for year", i64::from(year)))
    }

    /// Every stored table, newest year first.
    pub async fn list_tables(&self) -> PayrollResult<Vec<TaxBracketTable>> {
        Ok(self.repo.list_tax_tables().await?)
    }
}
