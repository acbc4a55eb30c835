use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use payroll_data::TaxTableLoader;
use payroll_db_sqlite::SqliteRepository;

/// Load INSS/IRRF bracket tables from a CSV file into the database.
///
/// The CSV file should have the following columns:
/// - year: fiscal year (e.g., 2025)
/// - kind: inss or irrf
/// - up_to: upper bound of the bracket
/// - rate: percentage (e.g., 7.5)
/// - deduction: fixed deduction (empty for zero)
#[derive(Parser, Debug)]
#[command(name = "payroll-table-loader")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the CSV file containing bracket rows
    #[arg(short, long)]
    file: PathBuf,

    /// SQLite database URL (e.g., sqlite:payroll.db?mode=rwc to create if missing)
    #[arg(short, long, default_value = "sqlite:payroll.db?mode=rwc")]
    database: String,

    /// Run database migrations before loading data
    #[arg(short, long, default_value_t = false)]
    migrate: bool,

    /// Run seed files from the specified directory after migrations
    #[arg(short, long)]
    seeds: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let repo = SqliteRepository::new(&args.database)
        .await
        .with_context(|| format!("Failed to connect to database: {}", args.database))?;

    if args.migrate {
        println!("Running migrations...");
        repo.run_migrations()
            .await
            .context("Failed to run migrations")?;
        println!("Migrations complete.");
    }

    if let Some(seeds_dir) = &args.seeds {
        println!("Running seeds from: {}", seeds_dir.display());
        repo.run_seeds(seeds_dir)
            .await
            .with_context(|| format!("Failed to run seeds from: {}", seeds_dir.display()))?;
        println!("Seeds complete.");
    }

    println!("Loading tax tables from: {}", args.file.display());

    let file = File::open(&args.file)
        .with_context(|| format!("Failed to open: {}", args.file.display()))?;

    let records = TaxTableLoader::parse(file)
        .with_context(|| format!("Failed to parse CSV: {}", args.file.display()))?;
    let tables = TaxTableLoader::group(&records).context("Invalid bracket data")?;

    println!(
        "Parsed {} rows into {} tables",
        records.len(),
        tables.len()
    );

    let summary = TaxTableLoader::load(&repo, &tables)
        .await
        .context("Failed to load tax tables into database")?;

    println!(
        "Loaded {} new tables ({} already present).",
        summary.inserted, summary.unchanged
    );

    Ok(())
}
