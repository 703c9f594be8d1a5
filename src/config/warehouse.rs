//! Warehouse connection configuration (`[CLUSTER]` section).

use std::fmt;

use serde::Deserialize;

use super::{require_non_empty, unquote, ConfigError};
use crate::warehouse::Dialect;

/// Warehouse connection parameters.
///
/// For the SQLite dialect `db_name` is the database file path (or
/// `:memory:`) and the network fields are ignored. The network fields may
/// be omitted; `validate` requires them for the wire protocol dialects.
#[derive(Clone, Deserialize)]
pub struct ClusterConfig {
    /// Cluster endpoint host name.
    #[serde(default, alias = "HOST")]
    pub host: String,
    /// Database name.
    #[serde(alias = "DB_NAME")]
    pub db_name: String,
    /// Database user.
    #[serde(default, alias = "DB_USER")]
    pub db_user: String,
    /// Database password.
    #[serde(default, alias = "DB_PASSWORD")]
    pub db_password: String,
    /// Database port (Redshift default is 5439).
    #[serde(default, alias = "DB_PORT")]
    pub db_port: u16,
    /// SQL dialect of the target warehouse.
    /// Default: redshift
    #[serde(default, alias = "DIALECT")]
    pub dialect: Dialect,
}

impl ClusterConfig {
    /// SQLite configuration for local runs and tests.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            host: String::new(),
            db_name: path.into(),
            db_user: String::new(),
            db_password: String::new(),
            db_port: 0,
            dialect: Dialect::Sqlite,
        }
    }

    pub(super) fn normalize(&mut self) {
        unquote(&mut self.host);
        unquote(&mut self.db_name);
        unquote(&mut self.db_user);
        unquote(&mut self.db_password);
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty("CLUSTER.DB_NAME", &self.db_name)?;
        if self.dialect.is_wire_protocol() {
            require_non_empty("CLUSTER.HOST", &self.host)?;
            require_non_empty("CLUSTER.DB_USER", &self.db_user)?;
            if self.db_port == 0 {
                return Err(ConfigError::Invalid {
                    key: "CLUSTER.DB_PORT",
                    reason: "must be a non-zero port".to_string(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ClusterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterConfig")
            .field("host", &self.host)
            .field("db_name", &self.db_name)
            .field("db_user", &self.db_user)
            .field("db_password", &"<redacted>")
            .field("db_port", &self.db_port)
            .field("dialect", &self.dialect)
            .finish()
    }
}
