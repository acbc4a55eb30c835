//! Withholding calculations for INSS and IRRF.
//!
//! The two withholdings deliberately use different bracket methods: INSS
//! accumulates marginal slices under a ceiling, IRRF applies one flat rate
//! minus a fixed deduction.

pub mod common;
pub mod config;
pub mod inss;
pub mod irrf;
pub mod withholding;

pub use common::AmountOverflow;
pub use config::{WithholdingConfig, WithholdingConfigError};
pub use inss::inss_withholding;
pub use irrf::irrf_withholding;
pub use withholding::{WithholdingCalculator, compute_inss, compute_irrf};
