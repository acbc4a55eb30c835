//! Command-line front end for the payroll engine.

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
pub mod utils;

pub use app::{App, build_registry};
pub use cli::{Cli, Command};
pub use config::AppConfig;
