//! songplay-transform: Populate dimensions and facts from staging
//!
//! Runs only the transform stage against already-loaded staging tables.
//!
//! ## Configuration
//! - dwh.cfg in the working directory, or the file named by DWH_CONFIG
//! - DWH__<SECTION>__<KEY>: override any key
//! - DWH__PIPELINE__COMMIT: per_statement (default) or single_transaction
//! - DWH_LOG: tracing filter (default: info)

use tracing::info;

use songplay_warehouse::pipeline::{Pipeline, Stage};
use songplay_warehouse::utils::bootstrap::{connect, finish, init_tracing};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let (config, mut warehouse) = connect().await?;
    let pipeline = Pipeline::from_config(&config);

    let result = pipeline.run(warehouse.as_mut(), &[Stage::Transform]).await;
    let report = finish(warehouse, result).await?;

    for step in &report.steps {
        info!(table = %step.table, rows = step.rows, "Inserted");
    }
    Ok(())
}
