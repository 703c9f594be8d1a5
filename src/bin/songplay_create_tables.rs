//! songplay-create-tables: (Re)create the warehouse schema
//!
//! Drops every staging, dimension and fact table that exists, then creates
//! them all empty. Existing data is lost.
//!
//! ## Configuration
//! - dwh.cfg in the working directory, or the file named by DWH_CONFIG
//! - DWH__<SECTION>__<KEY>: override any key
//! - DWH_LOG: tracing filter (default: info)

use tracing::info;

use songplay_warehouse::schema::SchemaManager;
use songplay_warehouse::utils::bootstrap::{connect, finish, init_tracing};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let (_config, mut warehouse) = connect().await?;
    let manager = SchemaManager::new();

    let result = manager.reset(warehouse.as_mut()).await;
    finish(warehouse, result).await?;

    info!(tables = manager.tables().len(), "Schema created");
    Ok(())
}
