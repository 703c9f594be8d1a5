//! SQLite warehouse for local runs and tests.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info, warn};

use super::{Dialect, Result, Statement, Warehouse, WarehouseError};
use crate::config::ClusterConfig;

/// In-memory database path.
pub const MEMORY: &str = ":memory:";

/// SQLite-backed warehouse.
///
/// Foreign keys are enforced, so inserting facts before their dimensions
/// fails exactly as it would on a constraint-enforcing warehouse.
pub struct SqliteWarehouse {
    pool: SqlitePool,
    transaction: Option<Transaction<'static, Sqlite>>,
}

impl SqliteWarehouse {
    /// Open the database named by `CLUSTER.DB_NAME`.
    pub async fn connect(config: &ClusterConfig) -> Result<Self> {
        Self::open(&config.db_name).await
    }

    /// Open a database file (created if missing) or `:memory:`.
    pub async fn open(path: &str) -> Result<Self> {
        let options = if path == MEMORY {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
        }
        .foreign_keys(true);

        // A single connection that never idles out; an in-memory database
        // lives exactly as long as its connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        info!(path = %path, "Opened SQLite warehouse");
        Ok(Self::new(pool))
    }

    /// Fresh in-memory database.
    pub async fn in_memory() -> Result<Self> {
        Self::open(MEMORY).await
    }

    /// Wrap an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            transaction: None,
        }
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Warehouse for SqliteWarehouse {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    async fn begin(&mut self) -> Result<()> {
        if self.transaction.is_some() {
            return Err(WarehouseError::TransactionState("transaction already open"));
        }
        self.transaction = Some(self.pool.begin().await?);
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let transaction = self
            .transaction
            .take()
            .ok_or(WarehouseError::TransactionState("no open transaction to commit"))?;
        transaction.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        let transaction = self
            .transaction
            .take()
            .ok_or(WarehouseError::TransactionState("no open transaction to roll back"))?;
        transaction.rollback().await?;
        Ok(())
    }

    async fn execute(&mut self, statement: Statement) -> Result<u64> {
        debug!(sql = %statement.sql, "Executing statement");
        let Statement { sql, values } = statement;
        let done = match self.transaction.as_mut() {
            Some(transaction) => {
                sqlx::query_with(&sql, values)
                    .execute(&mut **transaction)
                    .await?
            }
            None => sqlx::query_with(&sql, values).execute(&self.pool).await?,
        };
        Ok(done.rows_affected())
    }

    async fn fetch_count(&mut self, statement: Statement) -> Result<i64> {
        let Statement { sql, values } = statement;
        let count = match self.transaction.as_mut() {
            Some(transaction) => {
                sqlx::query_scalar_with::<_, i64, _>(&sql, values)
                    .fetch_one(&mut **transaction)
                    .await?
            }
            None => {
                sqlx::query_scalar_with::<_, i64, _>(&sql, values)
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count)
    }

    async fn close(&mut self) -> Result<()> {
        let rolled_back = match self.transaction.take() {
            Some(transaction) => transaction.rollback().await.inspect_err(|e| {
                warn!(error = %e, "Rollback of open transaction failed");
            }),
            None => Ok(()),
        };
        self.pool.close().await;
        info!("Warehouse connection closed");
        Ok(rolled_back?)
    }
}
