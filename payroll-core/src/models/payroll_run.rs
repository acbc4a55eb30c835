use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A monthly pay period (competência).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayPeriod {
    pub id: i64,
    pub year: i32,
    pub month: u32,
}

impl PayPeriod {
    pub fn is_valid_month(month: u32) -> bool {
        (1..=12).contains(&month)
    }
}

impl fmt::Display for PayPeriod {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{:02}/{}", self.month, self.year)
    }
}

/// The payroll of one pay period; owns one payslip per employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollRun {
    pub id: i64,
    pub pay_period_id: i64,
    pub closed: bool,
    pub created_at: DateTime<Utc>,
}
