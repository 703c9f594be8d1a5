//! Staging sources: where raw data lives and how to read it.

use std::fmt;
use std::path::PathBuf;

use crate::config::{Config, IamRoleConfig, S3Config, DEFAULT_REGION};
use crate::schema::Table;

const S3_SCHEME: &str = "s3://";

/// Staging table a source lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingTable {
    Events,
    Songs,
}

impl StagingTable {
    pub fn table(&self) -> Table {
        match self {
            StagingTable::Events => Table::StagingEvents,
            StagingTable::Songs => Table::StagingSongs,
        }
    }
}

impl fmt::Display for StagingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table().name())
    }
}

/// Where a dataset lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// Object storage URI, bulk-copied by the warehouse itself.
    S3(String),
    /// Local JSON file or directory, read and inserted by the loader.
    Local(PathBuf),
}

impl SourceLocation {
    /// `s3://` URIs are object storage; anything else is a local path.
    pub fn parse(location: &str) -> Self {
        if location.starts_with(S3_SCHEME) {
            SourceLocation::S3(location.to_string())
        } else {
            SourceLocation::Local(PathBuf::from(location))
        }
    }

    pub fn is_s3(&self) -> bool {
        matches!(self, SourceLocation::S3(_))
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocation::S3(uri) => f.write_str(uri),
            SourceLocation::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Credentials the warehouse presents to object storage.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    AccessKey { key_id: String, secret: String },
    IamRole { arn: String },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::AccessKey { .. } => f
                .debug_struct("AccessKey")
                .field("key_id", &"<redacted>")
                .field("secret", &"<redacted>")
                .finish(),
            Credentials::IamRole { arn } => f.debug_struct("IamRole").field("arn", arn).finish(),
        }
    }
}

/// Record format of a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataFormat {
    /// JSON, mapped through a jsonpaths file or by matching key names.
    Json { jsonpaths: Option<String> },
}

/// Encoding of timestamp fields in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFormat {
    /// Milliseconds since the Unix epoch.
    EpochMillis,
}

impl TimeFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFormat::EpochMillis => "epochmillisecs",
        }
    }
}

/// One dataset to load into one staging table.
#[derive(Debug, Clone, PartialEq)]
pub struct CopySource {
    pub table: StagingTable,
    pub location: SourceLocation,
    pub credentials: Option<Credentials>,
    pub format: DataFormat,
    pub region: String,
    pub time_format: Option<TimeFormat>,
}

impl CopySource {
    /// Activity log: access-key pair, jsonpaths mapping, epoch-millisecond
    /// timestamps.
    pub fn events(s3: &S3Config, iam: &IamRoleConfig) -> Self {
        let jsonpaths = Some(s3.log_jsonpath.clone()).filter(|p| !p.is_empty());
        Self {
            table: StagingTable::Events,
            location: SourceLocation::parse(&s3.log_data),
            credentials: Some(Credentials::AccessKey {
                key_id: iam.key.clone(),
                secret: iam.secret.clone(),
            }),
            format: DataFormat::Json { jsonpaths },
            region: s3.region.clone(),
            time_format: Some(TimeFormat::EpochMillis),
        }
    }

    /// Song catalog: IAM role, keys mapped by name.
    pub fn songs(s3: &S3Config, iam: &IamRoleConfig) -> Self {
        Self {
            table: StagingTable::Songs,
            location: SourceLocation::parse(&s3.song_data),
            credentials: Some(Credentials::IamRole {
                arn: iam.arn.clone(),
            }),
            format: DataFormat::Json { jsonpaths: None },
            region: s3.region.clone(),
            time_format: None,
        }
    }

    /// Local JSON records with no credentials.
    pub fn local(table: StagingTable, path: impl Into<PathBuf>) -> Self {
        let time_format = match table {
            StagingTable::Events => Some(TimeFormat::EpochMillis),
            StagingTable::Songs => None,
        };
        Self {
            table,
            location: SourceLocation::Local(path.into()),
            credentials: None,
            format: DataFormat::Json { jsonpaths: None },
            region: DEFAULT_REGION.to_string(),
            time_format,
        }
    }

    /// The events and songs sources, in that order.
    pub fn from_config(config: &Config) -> Vec<CopySource> {
        vec![
            Self::events(&config.s3, &config.iam_role),
            Self::songs(&config.s3, &config.iam_role),
        ]
    }
}
