//! Object storage configuration (`[S3]` and `[IAM_ROLE]` sections).

use std::fmt;

use serde::Deserialize;

use super::{require_non_empty, unquote, ConfigError};

/// Region the source buckets live in.
pub const DEFAULT_REGION: &str = "us-west-2";

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

/// Locations of the raw datasets.
///
/// Values are `s3://` URIs for Redshift bulk copies. Any other value is
/// treated as a local file or directory of JSON records.
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    /// Activity log dataset.
    #[serde(alias = "LOG_DATA")]
    pub log_data: String,
    /// Field mapping (jsonpaths) file for the activity log dataset.
    #[serde(alias = "LOG_JSONPATH")]
    pub log_jsonpath: String,
    /// Song catalog dataset.
    #[serde(alias = "SONG_DATA")]
    pub song_data: String,
    /// Bucket region.
    /// Default: us-west-2
    #[serde(default = "default_region", alias = "REGION")]
    pub region: String,
}

impl S3Config {
    pub(super) fn normalize(&mut self) {
        unquote(&mut self.log_data);
        unquote(&mut self.log_jsonpath);
        unquote(&mut self.song_data);
        unquote(&mut self.region);
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty("S3.LOG_DATA", &self.log_data)?;
        require_non_empty("S3.SONG_DATA", &self.song_data)?;
        require_non_empty("S3.REGION", &self.region)
    }
}

/// Credentials the warehouse uses to read the buckets.
#[derive(Clone, Deserialize)]
pub struct IamRoleConfig {
    /// Access key id (activity log copy).
    #[serde(alias = "KEY")]
    pub key: String,
    /// Secret access key (activity log copy).
    #[serde(alias = "SECRET")]
    pub secret: String,
    /// Role ARN (song catalog copy).
    #[serde(alias = "ARN")]
    pub arn: String,
}

impl IamRoleConfig {
    pub(super) fn normalize(&mut self) {
        unquote(&mut self.key);
        unquote(&mut self.secret);
        unquote(&mut self.arn);
    }
}

impl fmt::Debug for IamRoleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IamRoleConfig")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .field("arn", &self.arn)
            .finish()
    }
}
