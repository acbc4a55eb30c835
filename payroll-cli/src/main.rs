use std::io;

use anyhow::Result;
use clap::Parser;
use payroll_cli::{App, AppConfig, Cli, build_registry, logging};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?.with_overrides(
        cli.backend,
        cli.db,
        cli.log_level,
    );
    logging::init_logging(&config.logging)?;

    // ─── Storage ─────────────────────────────────────────────────────────
    let registry = build_registry();
    info!(
        backend = %config.database.backend,
        available = ?registry.available_backends(),
        "opening storage"
    );
    let app = App::connect(&registry, &config).await?;

    // ─── Command ─────────────────────────────────────────────────────────
    let mut stdout = io::stdout().lock();
    app.execute(cli.command, &mut stdout).await
}
