//! Error types for the payroll engine.

use thiserror::Error;

use crate::calculations::{AmountOverflow, WithholdingConfigError};
use crate::db::RepositoryError;
use crate::models::{TaxKind, TaxTableError};

/// Errors surfaced by [`crate::TaxTableProvider`], [`crate::PayslipEngine`]
/// and [`crate::PayrollRunGenerator`].
///
/// None of them are retried by the engine; they propagate unchanged to the
/// caller.
///
/// ```
/// use payroll_core::{PayrollError, TaxKind};
///
/// let error = PayrollError::Configuration { kind: TaxKind::Inss, year: 2025 };
/// assert_eq!(
///     error.to_string(),
///     "no inss tax table configured (requested year 2025)"
/// );
/// ```
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayrollError {
    /// No table of this kind exists for any year. Needs master data.
    #[error("no {kind} tax table configured (requested year {year})")]
    Configuration { kind: TaxKind, year: i32 },

    /// A line item kind the engine depends on is missing from the catalog.
    #[error("line item kind '{0}' is not configured")]
    MissingLineItemKind(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("payroll run {0} is closed")]
    RunClosed(i64),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl PayrollError {
    pub fn not_found(
        entity: &'static str,
        id: i64,
    ) -> impl FnOnce(RepositoryError) -> PayrollError {
        move |err| match err {
            RepositoryError::NotFound => PayrollError::NotFound { entity, id },
            other => PayrollError::Repository(other),
        }
    }
}

impl From<TaxTableError> for PayrollError {
    fn from(err: TaxTableError) -> Self {
        PayrollError::Validation(err.to_string())
    }
}

impl From<AmountOverflow> for PayrollError {
    fn from(err: AmountOverflow) -> Self {
        PayrollError::Validation(err.to_string())
    }
}

impl From<WithholdingConfigError> for PayrollError {
    fn from(err: WithholdingConfigError) -> Self {
        PayrollError::Validation(err.to_string())
    }
}

pub type PayrollResult<T> = Result<T, PayrollError>;
