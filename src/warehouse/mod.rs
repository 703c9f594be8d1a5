//! Warehouse connections.
//!
//! A `Warehouse` owns the single connection an ETL run executes on. Backends
//! differ in SQL dialect and driver, but the schema manager, loader and
//! transformer only see this trait.

use std::path::PathBuf;

use async_trait::async_trait;
use sea_query::{Asterisk, Expr, Query};
use sea_query_binder::SqlxValues;
use tracing::{error, info, warn};

use crate::config::{ClusterConfig, ConfigError};
use crate::schema::Table;

mod dialect;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use dialect::{DatePart, Dialect};

#[cfg(feature = "postgres")]
pub use postgres::PostgresWarehouse;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteWarehouse;

/// Result type for warehouse operations.
pub type Result<T> = std::result::Result<T, WarehouseError>;

/// Errors that can occur while talking to the warehouse.
#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Query build error: {0}")]
    Query(#[from] sea_query::error::Error),

    #[error("{operation} is not supported by the {dialect} dialect")]
    Unsupported {
        dialect: Dialect,
        operation: &'static str,
    },

    #[error("Invalid staging source: {0}")]
    InvalidSource(String),

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed JSON record in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Dependency cycle between {0}")]
    DependencyCycle(String),

    #[error("Transaction state error: {0}")]
    TransactionState(&'static str),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// A rendered SQL statement with its bound values.
///
/// Statements without values are sent over the simple query protocol, which
/// Redshift requires for utility statements such as COPY.
pub struct Statement {
    pub sql: String,
    pub values: SqlxValues,
}

impl Statement {
    /// Statement with no bound values.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            values: SqlxValues(sea_query::Values(Vec::new())),
        }
    }

    /// Statement with values bound to its placeholders.
    pub fn bound(sql: String, values: SqlxValues) -> Self {
        Self { sql, values }
    }

    /// Whether the statement carries bound values.
    pub fn is_bound(&self) -> bool {
        !self.values.0 .0.is_empty()
    }
}

/// Interface for the warehouse the pipeline runs against.
///
/// Implementations:
/// - `PostgresWarehouse`: Amazon Redshift or PostgreSQL over the wire protocol
/// - `SqliteWarehouse`: SQLite file or in-memory database
///
/// Every implementation holds exactly one connection. Statements run
/// sequentially; outside an explicit transaction each `execute` is committed
/// by the database on completion.
#[async_trait]
pub trait Warehouse: Send {
    /// SQL dialect used to render statements for this warehouse.
    fn dialect(&self) -> Dialect;

    /// Whether an explicit transaction is currently open.
    fn in_transaction(&self) -> bool;

    /// Open a transaction. Fails if one is already open.
    async fn begin(&mut self) -> Result<()>;

    /// Commit the open transaction.
    async fn commit(&mut self) -> Result<()>;

    /// Roll back the open transaction.
    async fn rollback(&mut self) -> Result<()>;

    /// Execute one statement and return the number of affected rows.
    async fn execute(&mut self, statement: Statement) -> Result<u64>;

    /// Execute a statement returning a single integer (e.g. `COUNT(*)`).
    async fn fetch_count(&mut self, statement: Statement) -> Result<i64>;

    /// Roll back any open transaction and close the connection.
    async fn close(&mut self) -> Result<()>;

    /// Execute statements as one commit unit.
    ///
    /// If no transaction is open, the statements run inside their own
    /// transaction which is committed on success and rolled back on the
    /// first failure. Inside an open transaction they simply join it.
    async fn execute_unit(&mut self, statements: Vec<Statement>) -> Result<u64> {
        let owns_transaction = !self.in_transaction();
        if owns_transaction {
            self.begin().await?;
        }

        let mut affected = 0;
        for statement in statements {
            match self.execute(statement).await {
                Ok(rows) => affected += rows,
                Err(e) => {
                    if owns_transaction {
                        if let Err(rollback_err) = self.rollback().await {
                            warn!(error = %rollback_err, "Rollback after failed statement also failed");
                        }
                    }
                    return Err(e);
                }
            }
        }

        if owns_transaction {
            self.commit().await?;
        }
        Ok(affected)
    }

    /// Count the rows of a table.
    async fn count_rows(&mut self, table: Table) -> Result<i64> {
        let statement = self.dialect().build_select(
            &Query::select()
                .expr(Expr::col(Asterisk).count())
                .from(table)
                .to_owned(),
        );
        self.fetch_count(statement).await
    }
}

/// Connect to the warehouse described by the configuration.
pub async fn connect(config: &ClusterConfig) -> Result<Box<dyn Warehouse>> {
    match config.dialect {
        #[cfg(feature = "postgres")]
        Dialect::Redshift | Dialect::Postgres => {
            info!(
                "Warehouse: {} at {}:{}/{}",
                config.dialect, config.host, config.db_port, config.db_name
            );
            Ok(Box::new(PostgresWarehouse::connect(config).await?))
        }
        #[cfg(feature = "sqlite")]
        Dialect::Sqlite => {
            info!("Warehouse: {} at {}", config.dialect, config.db_name);
            Ok(Box::new(SqliteWarehouse::connect(config).await?))
        }
        #[allow(unreachable_patterns)]
        other => {
            error!("Warehouse dialect {} requested but its feature is not enabled", other);
            Err(WarehouseError::Unsupported {
                dialect: other,
                operation: "connecting (backend feature not enabled)",
            })
        }
    }
}
