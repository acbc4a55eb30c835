use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::repository::{PayrollRepository, RepositoryError};

/// Which storage backend to open, and how.
///
/// | backend  | connection_string examples                    |
/// |----------|-----------------------------------------------|
/// | `sqlite` | `payroll.db`, `sqlite:payroll.db`, `:memory:` |
///
/// The connection string is opaque here and only interpreted by the
/// backend's factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// Lowercase backend name.
    pub backend: String,
    pub connection_string: String,
}

impl DbConfig {
    /// Normalises `backend` to the lowercase form factories register under.
    pub fn new(
        backend: &str,
        connection_string: impl Into<String>,
    ) -> Self {
        Self {
            backend: backend.trim().to_ascii_lowercase(),
            connection_string: connection_string.into(),
        }
    }

    /// An ephemeral SQLite database, mostly for tests.
    pub fn in_memory() -> Self {
        Self::new("sqlite", ":memory:")
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl fmt::Display for DbConfig {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{} ({})", self.backend, self.connection_string)
    }
}

/// Opens one kind of storage. Each backend crate provides one.
#[async_trait]
pub trait RepositoryFactory: Send + Sync {
    /// Lowercase name matched against [`DbConfig::backend`].
    fn backend_name(&self) -> &'static str;

    /// Returns a repository with its schema and master data in place, so the
    /// engine can use it straight away.
    async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn PayrollRepository>, RepositoryError>;
}

/// The backends a binary links against, by name.
///
/// The entry point registers its factories once and asks for a repository
/// with [`RepositoryRegistry::connect`]; everything downstream only sees the
/// [`PayrollRepository`] trait object.
#[derive(Default)]
pub struct RepositoryRegistry {
    factories: BTreeMap<&'static str, Box<dyn RepositoryFactory>>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `factory`. A later factory with the same name wins.
    pub fn register(
        &mut self,
        factory: Box<dyn RepositoryFactory>,
    ) -> &mut Self {
        self.factories.insert(factory.backend_name(), factory);
        self
    }

    /// Registered backend names in alphabetical order.
    pub fn available_backends(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    pub fn supports(
        &self,
        backend: &str,
    ) -> bool {
        self.factories.contains_key(backend)
    }

    /// Opens the backend named by `config.backend`.
    ///
    /// # Errors
    /// [`RepositoryError::Configuration`] for an unregistered backend;
    /// otherwise whatever the factory reports.
    pub async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn PayrollRepository>, RepositoryError> {
        let Some(factory) = self.factories.get(config.backend.as_str()) else {
            return Err(RepositoryError::Configuration(format!(
                "no storage backend named '{}' (registered: {})",
                config.backend,
                self.available_backends().join(", ")
            )));
        };
        debug!(%config, "opening storage");
        factory.create(config).await
    }

    /// [`RepositoryRegistry::create`] behind an `Arc`, ready to hand to the
    /// table provider, the engine and the run generator.
    pub async fn connect(
        &self,
        config: &DbConfig,
    ) -> Result<Arc<dyn PayrollRepository>, RepositoryError> {
        Ok(Arc::from(self.create(config).await?))
    }
}
