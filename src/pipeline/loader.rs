//! Loading raw datasets into the staging tables.

use tracing::{debug, info};

use super::copy::{copy_statement, redacted_copy_statement};
use super::local::{insert_statements, read_records, StagingEventRecord, StagingSongRecord};
use super::source::{CopySource, SourceLocation, StagingTable};
use crate::config::Config;
use crate::warehouse::{Result, Statement, Warehouse, WarehouseError};

/// Result of loading one source.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    pub table: StagingTable,
    pub rows: u64,
}

/// Loads each configured source into its staging table.
#[derive(Debug, Clone)]
pub struct Loader {
    sources: Vec<CopySource>,
}

impl Loader {
    pub fn new(sources: Vec<CopySource>) -> Self {
        Self { sources }
    }

    /// Events and songs sources from `[S3]` and `[IAM_ROLE]`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(CopySource::from_config(config))
    }

    pub fn sources(&self) -> &[CopySource] {
        &self.sources
    }

    /// Load one source as its own commit unit.
    ///
    /// `s3://` locations are bulk-copied by the warehouse. Local paths are
    /// read here and inserted in batches.
    pub async fn load_staging(
        &self,
        warehouse: &mut dyn Warehouse,
        source: &CopySource,
    ) -> Result<LoadOutcome> {
        let statements = match &source.location {
            SourceLocation::S3(_) => {
                let dialect = warehouse.dialect();
                if !dialect.supports_bulk_copy() {
                    return Err(WarehouseError::Unsupported {
                        dialect,
                        operation: "bulk copy from object storage",
                    });
                }
                info!(
                    table = %source.table,
                    "Copying into staging:\n{}",
                    redacted_copy_statement(source)?
                );
                vec![Statement::raw(copy_statement(source)?)]
            }
            SourceLocation::Local(path) => {
                if source.credentials.is_some() {
                    debug!(path = %path.display(), "Ignoring credentials for local source");
                }
                let inserts = match source.table {
                    StagingTable::Events => {
                        insert_statements(read_records::<StagingEventRecord>(path)?)?
                    }
                    StagingTable::Songs => {
                        insert_statements(read_records::<StagingSongRecord>(path)?)?
                    }
                };
                info!(
                    table = %source.table,
                    path = %path.display(),
                    batches = inserts.len(),
                    "Inserting local records into staging"
                );
                let dialect = warehouse.dialect();
                inserts
                    .iter()
                    .map(|insert| dialect.build_insert(insert))
                    .collect()
            }
        };

        let rows = warehouse.execute_unit(statements).await?;
        info!(table = %source.table, rows, "Staging load complete");
        Ok(LoadOutcome {
            table: source.table,
            rows,
        })
    }

    /// Load every source in order, stopping at the first failure.
    pub async fn load_all(&self, warehouse: &mut dyn Warehouse) -> Result<Vec<LoadOutcome>> {
        let mut outcomes = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            outcomes.push(self.load_staging(warehouse, source).await?);
        }
        Ok(outcomes)
    }
}
