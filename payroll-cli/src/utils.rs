use std::str::FromStr;

use payroll_core::TaxKind;
use regex::Regex;
use rust_decimal::Decimal;
use thiserror::Error;

/// Error returned when a string cannot be parsed as a money amount.
#[derive(Debug, Error)]
pub enum ParseMoneyError {
    #[error("empty amount")]
    Empty,

    #[error("invalid amount '{input}': {source}")]
    Invalid {
        input: String,
        #[source]
        source: rust_decimal::Error,
    },

    #[error("amount pattern failed to compile: {0}")]
    Pattern(#[from] regex::Error),
}

/// `1,234.56`: comma groups, optional dot fraction.
const GROUPED_DOT_DECIMAL: &str = r"^-?\d{1,3}(?:,\d{3})+(?:\.\d+)?$";

/// `1.234,56` or `1234,5`: dot groups (optional), comma fraction of one or
/// two digits.
const BRAZILIAN: &str = r"^-?(?:\d{1,3}(?:\.\d{3})+|\d+),\d{1,2}$";

/// Rewrites the accepted spellings into the plain `1234.56` form.
///
/// `1.234` stays a plain decimal; only a comma fraction marks the Brazilian
/// spelling.
fn normalize_money_input(s: &str) -> Result<String, ParseMoneyError> {
    let trimmed = s.trim();
    if Regex::new(GROUPED_DOT_DECIMAL)?.is_match(trimmed) {
        return Ok(trimmed.replace(',', ""));
    }
    if Regex::new(BRAZILIAN)?.is_match(trimmed) {
        return Ok(trimmed.replace('.', "").replace(',', "."));
    }
    Ok(trimmed.to_string())
}

/// Parses a money amount given on the command line.
///
/// Accepts `1234.56`, `1,234.56` and `1.234,56`. Empty input is an error;
/// sign checks are left to the engine.
pub fn parse_money(s: &str) -> Result<Decimal, ParseMoneyError> {
    let normalized = normalize_money_input(s)?;
    if normalized.is_empty() {
        return Err(ParseMoneyError::Empty);
    }
    Decimal::from_str(&normalized).map_err(|e| {
        tracing::debug!(input = %s, "invalid amount: {}", e);
        ParseMoneyError::Invalid {
            input: s.to_string(),
            source: e,
        }
    })
}

/// `inss` or `irrf`, any case.
pub fn parse_tax_kind(s: &str) -> Result<TaxKind, String> {
    TaxKind::parse(s).ok_or_else(|| format!("unknown tax kind '{s}' (expected inss or irrf)"))
}

/// Formats an optional text column, using "-" when absent.
pub fn opt_display(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}
