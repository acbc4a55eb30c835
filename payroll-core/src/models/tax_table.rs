use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The two statutory withholdings computed from bracket tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxKind {
    Inss,
    Irrf,
}

impl TaxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inss => "inss",
            Self::Irrf => "irrf",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inss" => Some(Self::Inss),
            "irrf" => Some(Self::Irrf),
            _ => None,
        }
    }
}

impl fmt::Display for TaxKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rate tier of a bracket table.
///
/// `rate` is a percentage (`7.5` means 7.5%). `deduction` is only meaningful
/// for IRRF tables and defaults to zero when absent from the stored JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bracket {
    pub up_to: Decimal,
    pub rate: Decimal,
    #[serde(default)]
    pub deduction: Decimal,
}

impl Bracket {
    pub fn new(
        up_to: Decimal,
        rate: Decimal,
        deduction: Decimal,
    ) -> Self {
        Self {
            up_to,
            rate,
            deduction,
        }
    }
}

/// Reasons a bracket table is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaxTableError {
    #[error("{kind} table for {year} has no brackets")]
    Empty { kind: TaxKind, year: i32 },

    #[error("{kind} table for {year}: bracket {index} has non-positive upper bound {up_to}")]
    NonPositiveBound {
        kind: TaxKind,
        year: i32,
        index: usize,
        up_to: Decimal,
    },

    #[error("{kind} table for {year}: bracket {index} is not above the previous upper bound")]
    NotAscending {
        kind: TaxKind,
        year: i32,
        index: usize,
    },

    #[error("{kind} table for {year}: bracket {index} rate {rate} is outside 0..=100")]
    RateOutOfRange {
        kind: TaxKind,
        year: i32,
        index: usize,
        rate: Decimal,
    },

    #[error("{kind} table for {year}: bracket {index} has negative deduction {deduction}")]
    NegativeDeduction {
        kind: TaxKind,
        year: i32,
        index: usize,
        deduction: Decimal,
    },

    #[error("invalid bracket JSON: {0}")]
    Json(String),
}

/// A progressive bracket table for one `(year, kind)`.
///
/// Brackets are ordered ascending by `up_to`; the last bracket is treated as
/// open-ended by the calculators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBracketTable {
    pub year: i32,
    pub kind: TaxKind,
    pub description: Option<String>,
    pub brackets: Vec<Bracket>,
}

impl TaxBracketTable {
    pub fn new(
        year: i32,
        kind: TaxKind,
        brackets: Vec<Bracket>,
    ) -> Self {
        Self {
            year,
            kind,
            description: None,
            brackets,
        }
    }

    pub fn with_description(
        mut self,
        description: impl Into<String>,
    ) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validate(&self) -> Result<(), TaxTableError> {
        let (kind, year) = (self.kind, self.year);
        if self.brackets.is_empty() {
            return Err(TaxTableError::Empty { kind, year });
        }

        let mut previous = Decimal::ZERO;
        for (index, bracket) in self.brackets.iter().enumerate() {
            if bracket.up_to <= Decimal::ZERO {
                return Err(TaxTableError::NonPositiveBound {
                    kind,
                    year,
                    index,
                    up_to: bracket.up_to,
                });
            }
            if index > 0 && bracket.up_to <= previous {
                return Err(TaxTableError::NotAscending { kind, year, index });
            }
            if bracket.rate < Decimal::ZERO || bracket.rate > Decimal::ONE_HUNDRED {
                return Err(TaxTableError::RateOutOfRange {
                    kind,
                    year,
                    index,
                    rate: bracket.rate,
                });
            }
            if bracket.deduction < Decimal::ZERO {
                return Err(TaxTableError::NegativeDeduction {
                    kind,
                    year,
                    index,
                    deduction: bracket.deduction,
                });
            }
            previous = bracket.up_to;
        }
        Ok(())
    }

    /// The persisted representation: a JSON array of `{upTo, rate, deduction}`.
    pub fn brackets_json(&self) -> Result<String, TaxTableError> {
        serde_json::to_string(&self.brackets).map_err(|e| TaxTableError::Json(e.to_string()))
    }

    pub fn brackets_from_json(json: &str) -> Result<Vec<Bracket>, TaxTableError> {
        serde_json::from_str(json).map_err(|e| TaxTableError::Json(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    fn inss_2025() -> TaxBracketTable {
        TaxBracketTable::new(
            2025,
            TaxKind::Inss,
            vec![
                Bracket::new(dec!(1412), dec!(7.5), dec!(0)),
                Bracket::new(dec!(2666.68), dec!(9), dec!(21.18)),
                Bracket::new(dec!(4000.03), dec!(12), dec!(101.18)),
                Bracket::new(dec!(7786.02), dec!(14), dec!(181.18)),
            ],
        )
    }

    #[test]
    fn tax_kind_parse_is_case_insensitive() {
        assert_eq!(TaxKind::parse("INSS"), Some(TaxKind::Inss));
        assert_eq!(TaxKind::parse(" irrf "), Some(TaxKind::Irrf));
        assert_eq!(TaxKind::parse("fgts"), None);
    }

    #[test]
    fn valid_table_passes_validation() {
        assert_eq!(inss_2025().validate(), Ok(()));
    }

    #[test]
    fn empty_table_is_rejected() {
        let table = TaxBracketTable::new(2025, TaxKind::Irrf, vec![]);

        assert_eq!(
            table.validate(),
            Err(TaxTableError::Empty {
                kind: TaxKind::Irrf,
                year: 2025
            })
        );
    }

    #[test]
    fn descending_bounds_are_rejected() {
        let mut table = inss_2025();
        table.brackets.swap(1, 2);

        assert_eq!(
            table.validate(),
            Err(TaxTableError::NotAscending {
                kind: TaxKind::Inss,
                year: 2025,
                index: 2
            })
        );
    }

    #[test]
    fn rate_above_one_hundred_is_rejected() {
        let mut table = inss_2025();
        table.brackets[3].rate = dec!(140);

        assert!(matches!(
            table.validate(),
            Err(TaxTableError::RateOutOfRange { index: 3, .. })
        ));
    }

    #[test]
    fn negative_deduction_is_rejected() {
        let mut table = inss_2025();
        table.brackets[0].deduction = dec!(-1);

        assert!(matches!(
            table.validate(),
            Err(TaxTableError::NegativeDeduction { index: 0, .. })
        ));
    }

    #[test]
    fn brackets_parse_from_numeric_json_without_deduction() {
        let json = r#"[{"upTo":1412,"rate":7.5},{"upTo":2666.68,"rate":9,"deduction":21.18}]"#;

        let brackets = TaxBracketTable::brackets_from_json(json).expect("valid JSON");

        assert_eq!(
            brackets,
            vec![
                Bracket::new(dec!(1412), dec!(7.5), dec!(0)),
                Bracket::new(dec!(2666.68), dec!(9), dec!(21.18)),
            ]
        );
    }

    #[test]
    fn brackets_json_is_readable_back() {
        let table = inss_2025();

        let json = table.brackets_json().expect("serializes");
        let parsed = TaxBracketTable::brackets_from_json(&json).expect("parses");

        assert!(json.contains("\"upTo\""));
        assert_eq!(parsed, table.brackets);
    }

    #[test]
    fn malformed_json_reports_error() {
        let result = TaxBracketTable::brackets_from_json("{not json");

        assert!(matches!(result, Err(TaxTableError::Json(_))));
    }
}
