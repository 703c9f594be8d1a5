//! Pipeline behaviour configuration (`[PIPELINE]` section, optional).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

/// How statements are grouped into transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitMode {
    /// Every statement (or staging source) commits on its own. A failure
    /// leaves earlier units committed.
    #[default]
    PerStatement,
    /// One transaction around the whole run, rolled back on any failure.
    SingleTransaction,
}

/// A pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Bulk-copy raw data into the staging tables.
    Load,
    /// Populate dimensions and facts from staging.
    Transform,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Transform => "transform",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "load" => Ok(Stage::Load),
            "transform" => Ok(Stage::Transform),
            other => Err(format!("unknown stage '{}'", other)),
        }
    }
}

/// Parse a comma separated stage list (`load, transform`).
fn deserialize_stages<'de, D>(deserializer: D) -> Result<Vec<Stage>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse().map_err(serde::de::Error::custom))
        .collect()
}

/// Pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Transaction grouping.
    /// Default: per_statement
    #[serde(alias = "COMMIT")]
    pub commit: CommitMode,
    /// Stages run by `songplay-etl`.
    /// Default: load
    #[serde(alias = "STAGES", deserialize_with = "deserialize_stages")]
    pub stages: Vec<Stage>,
    /// Drop and recreate the staging tables before loading, so staged rows
    /// never accumulate across runs.
    /// Default: true
    #[serde(alias = "RESET_STAGING")]
    pub reset_staging: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            commit: CommitMode::PerStatement,
            stages: vec![Stage::Load],
            reset_staging: true,
        }
    }
}
