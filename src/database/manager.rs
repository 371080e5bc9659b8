use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::info;

use crate::config;

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl From<DatabaseError> for crate::error::CoreError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ConfigMissing(what) => {
                crate::error::CoreError::internal(format!("missing configuration: {}", what))
            }
            DatabaseError::InvalidDatabaseUrl => {
                crate::error::CoreError::internal("invalid database URL")
            }
            DatabaseError::Sqlx(e) => e.into(),
        }
    }
}

static POOL: OnceCell<PgPool> = OnceCell::const_new();

/// Connection manager for the single shared database. All principals'
/// directory rows and partition tables live behind this one pool; the
/// partition naming convention is the only isolation boundary.
pub struct DatabaseManager;

impl DatabaseManager {
    /// Get the shared pool, creating it lazily from DATABASE_URL.
    pub async fn pool() -> Result<PgPool, DatabaseError> {
        let pool = POOL
            .get_or_try_init(|| async {
                let options = Self::build_connect_options()?;
                let db = &config::config().database;

                let pool = PgPoolOptions::new()
                    .max_connections(db.max_connections)
                    .acquire_timeout(Duration::from_secs(db.acquire_timeout_secs))
                    .connect_with(options)
                    .await?;

                info!("Created shared database pool");
                Ok::<_, DatabaseError>(pool)
            })
            .await?;
        Ok(pool.clone())
    }

    /// Build connect options from DATABASE_URL. An optional TENET_DB env var
    /// swaps the database name in the URL path, so one base URL can serve
    /// several deployments. Every connection carries a server-side
    /// statement_timeout so no single query can hold a request forever.
    fn build_connect_options() -> Result<PgConnectOptions, DatabaseError> {
        let base = std::env::var("DATABASE_URL")
            .map_err(|_| DatabaseError::ConfigMissing("DATABASE_URL"))?;

        let mut url = url::Url::parse(&base).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        if let Ok(db_name) = std::env::var("TENET_DB") {
            url.set_path(&format!("/{}", db_name));
        }

        let statement_timeout = config::config().database.statement_timeout_ms;
        let options = PgConnectOptions::from_str(url.as_str())
            .map_err(|_| DatabaseError::InvalidDatabaseUrl)?
            .options([("statement_timeout", statement_timeout.to_string())]);

        Ok(options)
    }

    /// Pings the shared pool to ensure connectivity
    pub async fn health_check() -> Result<(), DatabaseError> {
        let pool = Self::pool().await?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok(())
    }

    /// Quote SQL identifier to prevent injection
    pub fn quote_identifier(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Close the shared pool (e.g., on shutdown)
    pub async fn close() {
        if let Some(pool) = POOL.get() {
            pool.close().await;
            info!("Closed shared database pool");
        }
    }
}
