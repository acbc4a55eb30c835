use std::path::PathBuf;

use async_trait::async_trait;
use payroll_core::db::{DbConfig, RepositoryFactory};
use payroll_core::{PayrollRepository, RepositoryError};
use tracing::info;

use crate::repository::SqliteRepository;

/// Environment variable overriding the seeds directory.
pub const SEEDS_DIR_ENV: &str = "PAYROLL_DB_SQLITE_SEEDS_DIR";

/// Resolve the seeds directory at runtime so it works both from the build
/// tree and from a packaged install.
///
/// Resolution order:
/// 1. **`PAYROLL_DB_SQLITE_SEEDS_DIR`** if set.
/// 2. **`./seeds`** if that directory exists in the working directory.
/// 3. **`$CARGO_MANIFEST_DIR/seeds`** as last resort.
fn seeds_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(SEEDS_DIR_ENV) {
        return PathBuf::from(dir);
    }
    let cwd_seeds = PathBuf::from("./seeds");
    if cwd_seeds.is_dir() {
        return cwd_seeds;
    }
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("seeds")
}

/// [`RepositoryFactory`] for SQLite.
///
/// Register this with a [`payroll_core::db::RepositoryRegistry`] to make the
/// `"sqlite"` backend available:
///
/// ```rust,no_run
/// use payroll_core::db::RepositoryRegistry;
/// use payroll_db_sqlite::SqliteRepositoryFactory;
///
/// let mut registry = RepositoryRegistry::new();
/// registry.register(Box::new(SqliteRepositoryFactory));
/// ```
pub struct SqliteRepositoryFactory;

#[async_trait]
impl RepositoryFactory for SqliteRepositoryFactory {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    /// Opens the database described by `config.connection_string`, applies
    /// pending migrations and runs the seed files.
    ///
    /// Accepted connection strings:
    /// * a bare file path such as `"payroll.db"`, created when missing;
    /// * a sqlx URL such as `"sqlite:payroll.db?mode=rwc"`;
    /// * `":memory:"` for an ephemeral database.
    async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn PayrollRepository>, RepositoryError> {
        let repo = SqliteRepository::new(&config.connection_string).await?;
        repo.run_migrations()
            .await
            .map_err(|e| RepositoryError::Database(format!("{e:#}")))?;

        let seeds = seeds_dir();
        repo.run_seeds(&seeds)
            .await
            .map_err(|e| RepositoryError::Database(format!("{e:#}")))?;

        info!(
            connection = %config.connection_string,
            seeds = %seeds.display(),
            "sqlite repository ready"
        );
        Ok(Box::new(repo))
    }
}
