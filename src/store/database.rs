use std::fmt;
use std::time::Duration;

use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use tokio::sync::OnceCell;
use tokio::time;

use crate::errors::ReportError;
use crate::query::Dialect;

/// Connection pool settings.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    /// Upper bound on establishing (or waiting for) a connection.
    pub connect_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 5,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// The reporting database handle.
///
/// Owns the pool and opens it on first use. A failed open is not
/// remembered, so the next refresh cycle tries again. Call [`Database::close`]
/// on shutdown.
pub struct Database {
    url: String,
    dialect: Dialect,
    settings: PoolSettings,
    pool: OnceCell<AnyPool>,
}

impl Database {
    pub fn new(url: impl Into<String>, dialect: Dialect, settings: PoolSettings) -> Self {
        sqlx::any::install_default_drivers();
        Self {
            url: url.into(),
            dialect,
            settings,
            pool: OnceCell::new(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn is_connected(&self) -> bool {
        self.pool.initialized()
    }

    /// The pool, opened on first call.
    pub async fn pool(&self) -> Result<&AnyPool, ReportError> {
        self.pool.get_or_try_init(|| self.open()).await
    }

    async fn open(&self) -> Result<AnyPool, ReportError> {
        tracing::info!(
            engine = self.dialect.scheme(),
            max_connections = self.settings.max_connections,
            "opening reporting database pool"
        );

        let connect = AnyPoolOptions::new()
            .max_connections(self.settings.max_connections)
            .acquire_timeout(self.settings.connect_timeout)
            .connect(&self.url);

        match time::timeout(self.settings.connect_timeout, connect).await {
            Ok(Ok(pool)) => Ok(pool),
            Ok(Err(e)) => {
                tracing::error!("database connection failed: {}", e);
                Err(ReportError::Connection(e.to_string()))
            }
            Err(_) => {
                tracing::error!(
                    timeout_secs = self.settings.connect_timeout.as_secs(),
                    "database connection timed out"
                );
                Err(ReportError::Connection(format!(
                    "connect timed out after {}s",
                    self.settings.connect_timeout.as_secs()
                )))
            }
        }
    }

    /// `SELECT 1` round trip; false if the pool cannot be opened.
    pub async fn health_check(&self) -> bool {
        match self.pool().await {
            Ok(pool) => sqlx::query("SELECT 1").execute(pool).await.is_ok(),
            Err(_) => false,
        }
    }

    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
            tracing::info!("reporting database pool closed");
        }
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("dialect", &self.dialect)
            .field("settings", &self.settings)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}
