//! ETL configuration.
//!
//! Aggregates the `dwh.cfg` sections into a single Config struct that can be
//! loaded from INI files or environment variables. Each component receives
//! the slice of configuration it needs at construction time.

mod pipeline;
mod storage;
mod warehouse;

pub use pipeline::{CommitMode, PipelineConfig, Stage};
pub use storage::{IamRoleConfig, S3Config, DEFAULT_REGION};
pub use warehouse::ClusterConfig;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "dwh.cfg";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "DWH_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "DWH";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "DWH_LOG";

use serde::Deserialize;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Main ETL configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Warehouse connection parameters.
    #[serde(alias = "CLUSTER")]
    pub cluster: ClusterConfig,
    /// Object storage locations of the raw datasets.
    #[serde(alias = "S3")]
    pub s3: S3Config,
    /// Credentials handed to the warehouse for bulk copies.
    #[serde(alias = "IAM_ROLE")]
    pub iam_role: IamRoleConfig,
    /// Pipeline behaviour.
    #[serde(default, alias = "PIPELINE")]
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `dwh.cfg` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    ///    (e.g. `DWH__CLUSTER__DB_PASSWORD`)
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Ini).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Ini).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Ini).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.normalized()
    }

    /// Strip conventional quoting from values and validate required fields.
    pub fn normalized(mut self) -> Result<Self, ConfigError> {
        self.cluster.normalize();
        self.s3.normalize();
        self.iam_role.normalize();

        self.cluster.validate()?;
        self.s3.validate()?;
        Ok(self)
    }
}

/// Remove one layer of matching single or double quotes, as written in
/// hand-edited `dwh.cfg` files (`ARN='arn:aws:iam::...'`).
pub(crate) fn unquote(value: &mut String) {
    let trimmed = value.trim();
    let stripped = ['\'', '"'].iter().find_map(|q| {
        trimmed
            .strip_prefix(*q)
            .and_then(|rest| rest.strip_suffix(*q))
    });
    *value = stripped.unwrap_or(trimmed).to_string();
}

pub(crate) fn require_non_empty(key: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Invalid {
            key,
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}
