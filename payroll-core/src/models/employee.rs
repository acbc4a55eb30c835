use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    pub name: String,
    pub tax_id: Option<String>,
    pub salary: Decimal,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// For creating new employees (no id or timestamp)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEmployee {
    pub name: String,
    pub tax_id: Option<String>,
    pub salary: Decimal,
}
