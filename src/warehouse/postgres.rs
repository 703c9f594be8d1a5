//! PostgreSQL wire protocol warehouse (Amazon Redshift or PostgreSQL).

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info, warn};

use super::{Dialect, Result, Statement, Warehouse, WarehouseError};
use crate::config::ClusterConfig;

/// Runs a statement on an executor, using the simple query protocol when
/// nothing is bound.
macro_rules! run_statement {
    ($executor:expr, $statement:expr) => {{
        let Statement { sql, values } = $statement;
        let done = if values.0 .0.is_empty() {
            sqlx::Executor::execute($executor, sqlx::raw_sql(&sql)).await?
        } else {
            sqlx::query_with(&sql, values).execute($executor).await?
        };
        done.rows_affected()
    }};
}

/// Redshift/PostgreSQL-backed warehouse.
pub struct PostgresWarehouse {
    pool: PgPool,
    dialect: Dialect,
    transaction: Option<Transaction<'static, Postgres>>,
}

impl PostgresWarehouse {
    /// Connect using the cluster configuration.
    ///
    /// The pool is capped at one connection: every statement of a run goes
    /// through the same session.
    pub async fn connect(config: &ClusterConfig) -> Result<Self> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.db_port)
            .database(&config.db_name)
            .username(&config.db_user)
            .password(&config.db_password);

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        info!(dialect = %config.dialect, "Connected to warehouse");
        Ok(Self::new(pool, config.dialect))
    }

    /// Wrap an existing pool.
    pub fn new(pool: PgPool, dialect: Dialect) -> Self {
        Self {
            pool,
            dialect,
            transaction: None,
        }
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Warehouse for PostgresWarehouse {
    fn dialect(&self) -> Dialect {
        self.dialect
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
        // Unbound statements may carry COPY credentials.
        if statement.is_bound() {
            debug!(sql = %statement.sql, "Executing statement");
        }
        let rows = match self.transaction.as_mut() {
            Some(transaction) => run_statement!(&mut **transaction, statement),
            None => run_statement!(&self.pool, statement),
        };
        Ok(rows)
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
