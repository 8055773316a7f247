//! PostgreSQL backend for the connection pool
//!
//! Connections are plain sqlx `PgConnection`s; deadpool (through
//! [`super::pool`]) owns their lifecycle instead of sqlx's own pool.

use async_trait::async_trait;
use deadpool::managed::{self, Metrics, RecycleError, RecycleResult};
use sqlx::postgres::PgConnectOptions;
use sqlx::{ConnectOptions, Connection, PgConnection};

use super::error::DbError;
use super::pool::{Manager, Pool};

/// Pool of Postgres connections
pub type PgPool = Pool<PgManager>;

/// Opens and checks Postgres connections
#[derive(Debug, Clone)]
pub struct PgManager {
    options: PgConnectOptions,
}

impl PgManager {
    pub fn new(options: PgConnectOptions) -> Self {
        Self { options }
    }

    /// Build a manager from a `postgres://` connection string.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let manager = PgManager::from_url("postgres://localhost/gophertalk")?;
    /// let pool = Pool::connect(manager, PoolConfig::default()).await?;
    /// ```
    pub fn from_url(url: &str) -> Result<Self, DbError> {
        let options: PgConnectOptions = url
            .parse()
            .map_err(|e: sqlx::Error| DbError::Configuration(e.to_string()))?;
        Ok(Self::new(options))
    }
}

impl managed::Manager for PgManager {
    type Type = PgConnection;
    type Error = DbError;

    async fn create(&self) -> Result<PgConnection, DbError> {
        Ok(self.options.connect().await?)
    }

    async fn recycle(&self, conn: &mut PgConnection, _: &Metrics) -> RecycleResult<DbError> {
        // Also flushes any rollback queued by a dropped transaction.
        conn.ping()
            .await
            .map_err(|e| RecycleError::Backend(DbError::from(e)))
    }
}

#[async_trait]
impl Manager for PgManager {
    async fn ping(&self, conn: &mut PgConnection) -> Result<(), DbError> {
        sqlx::query("SELECT 1").execute(&mut *conn).await?;
        Ok(())
    }
}
