use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Whether a line item adds to or subtracts from pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineItemClass {
    Earning,
    Deduction,
}

impl LineItemClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Earning => "earning",
            Self::Deduction => "deduction",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "earning" => Some(Self::Earning),
            "deduction" => Some(Self::Deduction),
            _ => None,
        }
    }
}

/// Catalog entry describing a type of line item (e.g. `SALARIO`, `VT`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemKind {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub class: LineItemClass,
    pub counts_toward_inss_base: bool,
    pub counts_toward_irrf_base: bool,
}

impl LineItemKind {
    /// Code of the kind seeded as the base-salary earning of every payslip.
    pub const BASE_SALARY_CODE: &'static str = "SALARIO";

    pub fn is_earning(&self) -> bool {
        self.class == LineItemClass::Earning
    }

    /// Deduction kinds never contribute to a taxable base, whatever their flags say.
    pub fn contributes_to_inss(&self) -> bool {
        self.is_earning() && self.counts_toward_inss_base
    }

    pub fn contributes_to_irrf(&self) -> bool {
        self.is_earning() && self.counts_toward_irrf_base
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: i64,
    pub payslip_id: i64,
    pub kind_id: i64,
    pub amount: Decimal,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// For adding a line item to a payslip (no id, owner or timestamp)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLineItem {
    pub kind_id: i64,
    pub amount: Decimal,
    pub reference: Option<String>,
}

/// A line item joined with its catalog kind, as read by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemDetail {
    pub item: LineItem,
    pub kind: LineItemKind,
}
