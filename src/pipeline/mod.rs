//! The load/transform pipeline.
//!
//! - [`Loader`] fills the staging tables, from S3 via `COPY` or from local
//!   JSON files.
//! - [`Transformer`] populates dimensions and facts from staging.
//! - [`Pipeline`] runs the stages under the configured commit policy.

use tracing::{error, info, warn};

use crate::config::{CommitMode, Config};
use crate::schema::{SchemaManager, Table};
use crate::warehouse::{Result, Warehouse};

pub mod copy;
pub mod loader;
pub mod local;
pub mod source;
pub mod transform;

pub use crate::config::Stage;
pub use loader::{LoadOutcome, Loader};
pub use source::{CopySource, Credentials, DataFormat, SourceLocation, StagingTable, TimeFormat};
pub use transform::{TransformOutcome, TransformStep, Transformer, NEXT_SONG};

/// Rows affected by one pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub stage: Stage,
    /// Table the step wrote to.
    pub table: Table,
    pub rows: u64,
}

/// Summary of a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub steps: Vec<StepOutcome>,
    /// Row count of every table after the run.
    pub table_counts: Vec<(Table, i64)>,
}

impl PipelineReport {
    /// Rows written by the step targeting `table`, summed across stages.
    pub fn rows_for(&self, table: Table) -> u64 {
        self.steps
            .iter()
            .filter(|s| s.table == table)
            .map(|s| s.rows)
            .sum()
    }

    pub fn count_of(&self, table: Table) -> Option<i64> {
        self.table_counts
            .iter()
            .find(|(t, _)| *t == table)
            .map(|(_, count)| *count)
    }
}

/// Runs pipeline stages against one warehouse connection.
#[derive(Debug, Clone)]
pub struct Pipeline {
    loader: Loader,
    transformer: Transformer,
    commit: CommitMode,
    reset_staging: bool,
}

impl Pipeline {
    pub fn new(loader: Loader, transformer: Transformer) -> Self {
        Self {
            loader,
            transformer,
            commit: CommitMode::default(),
            reset_staging: true,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Loader::from_config(config), Transformer::new())
            .with_commit(config.pipeline.commit)
            .with_reset_staging(config.pipeline.reset_staging)
    }

    pub fn with_commit(mut self, commit: CommitMode) -> Self {
        self.commit = commit;
        self
    }

    /// Whether the load stage recreates the staging tables first.
    pub fn with_reset_staging(mut self, reset_staging: bool) -> Self {
        self.reset_staging = reset_staging;
        self
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    pub fn transformer(&self) -> &Transformer {
        &self.transformer
    }

    /// Run `stages` in the given order.
    ///
    /// With [`CommitMode::SingleTransaction`] everything runs in one
    /// transaction that is rolled back on the first error. Otherwise each
    /// statement or source commits as it completes.
    pub async fn run(
        &self,
        warehouse: &mut dyn Warehouse,
        stages: &[Stage],
    ) -> Result<PipelineReport> {
        info!(
            stages = ?stages,
            commit = ?self.commit,
            dialect = %warehouse.dialect(),
            "Starting pipeline"
        );

        let steps = match self.commit {
            CommitMode::PerStatement => self.run_stages(warehouse, stages).await?,
            CommitMode::SingleTransaction => {
                warehouse.begin().await?;
                match self.run_stages(warehouse, stages).await {
                    Ok(steps) => {
                        warehouse.commit().await?;
                        steps
                    }
                    Err(e) => {
                        error!(error = %e, "Pipeline failed, rolling back");
                        if let Err(rollback_err) = warehouse.rollback().await {
                            warn!(error = %rollback_err, "Rollback failed");
                        }
                        return Err(e);
                    }
                }
            }
        };

        let table_counts = self.table_counts(warehouse).await;
        Ok(PipelineReport {
            steps,
            table_counts,
        })
    }

    async fn run_stages(
        &self,
        warehouse: &mut dyn Warehouse,
        stages: &[Stage],
    ) -> Result<Vec<StepOutcome>> {
        let mut steps = Vec::new();
        for stage in stages {
            info!(stage = %stage, "Running stage");
            match stage {
                Stage::Load => {
                    if self.reset_staging {
                        SchemaManager::staging().reset(warehouse).await?;
                    }
                    for outcome in self.loader.load_all(warehouse).await? {
                        steps.push(StepOutcome {
                            stage: Stage::Load,
                            table: outcome.table.table(),
                            rows: outcome.rows,
                        });
                    }
                }
                Stage::Transform => {
                    for outcome in self
                        .transformer
                        .populate_dimensions_and_facts(warehouse)
                        .await?
                    {
                        steps.push(StepOutcome {
                            stage: Stage::Transform,
                            table: outcome.step.target(),
                            rows: outcome.rows,
                        });
                    }
                }
            }
        }
        Ok(steps)
    }

    /// Count and log the rows of every table. Tables that cannot be counted
    /// (e.g. not created yet) are logged and skipped.
    pub async fn table_counts(&self, warehouse: &mut dyn Warehouse) -> Vec<(Table, i64)> {
        let mut counts = Vec::with_capacity(Table::ALL.len());
        for table in Table::ALL {
            match warehouse.count_rows(table).await {
                Ok(count) => {
                    info!(table = %table, rows = count, "Table row count");
                    counts.push((table, count));
                }
                Err(e) => warn!(table = %table, error = %e, "Could not count rows"),
            }
        }
        counts
    }
}
