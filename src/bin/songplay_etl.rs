//! songplay-etl: Staging load and transform pipeline
//!
//! Connects to the warehouse, runs the configured pipeline stages and
//! closes the connection. By default only the staging load runs.
//!
//! ## Configuration
//! - dwh.cfg in the working directory, or the file named by DWH_CONFIG
//! - DWH__<SECTION>__<KEY>: override any key (e.g. DWH__CLUSTER__HOST)
//! - DWH__PIPELINE__STAGES: stages to run (default: load)
//! - DWH__PIPELINE__COMMIT: per_statement (default) or single_transaction
//! - DWH_LOG: tracing filter (default: info)

use tracing::info;

use songplay_warehouse::pipeline::Pipeline;
use songplay_warehouse::utils::bootstrap::{connect, finish, init_tracing};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let (config, mut warehouse) = connect().await?;
    let pipeline = Pipeline::from_config(&config);

    let result = pipeline
        .run(warehouse.as_mut(), &config.pipeline.stages)
        .await;
    let report = finish(warehouse, result).await?;

    info!(steps = report.steps.len(), "songplay-etl finished");
    Ok(())
}
