//! Bootstrap utilities for the ETL binaries.
//!
//! Shared initialization code for all songplay binaries.

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, LOG_ENV_VAR};
use crate::warehouse::{self, Result, Warehouse};

/// Initialize tracing with the DWH_LOG environment variable.
///
/// Defaults to "info" level if DWH_LOG is not set.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Load configuration and open the warehouse connection.
///
/// Configuration errors surface before any connection is attempted.
pub async fn connect() -> Result<(Config, Box<dyn Warehouse>)> {
    let config = Config::load(None)
        .inspect_err(|e| error!(error = %e, "Invalid configuration"))?;
    info!(dialect = %config.cluster.dialect, "Configuration loaded");
    let warehouse = warehouse::connect(&config.cluster)
        .await
        .inspect_err(|e| error!(error = %e, "Failed to connect to warehouse"))?;
    Ok((config, warehouse))
}

/// Close the connection and log the outcome of `result`.
///
/// A failed run takes precedence over a failed close.
pub async fn finish<T>(mut warehouse: Box<dyn Warehouse>, result: Result<T>) -> Result<T> {
    let closed = warehouse.close().await;
    match (result, closed) {
        (Err(e), closed) => {
            error!(error = %e, "Run failed");
            if let Err(close_err) = closed {
                warn!(error = %close_err, "Failed to close warehouse connection");
            }
            Err(e)
        }
        (Ok(_), Err(close_err)) => {
            error!(error = %close_err, "Failed to close warehouse connection");
            Err(close_err)
        }
        (Ok(value), Ok(())) => Ok(value),
    }
}
