//! Rendering Redshift `COPY` statements.
//!
//! COPY cannot take bind parameters, so every literal is validated and
//! quoted here before it reaches the statement text.

use super::source::{CopySource, Credentials, DataFormat, SourceLocation};
use crate::warehouse::{Result, WarehouseError};

const S3_SCHEME: &str = "s3://";
const IAM_ARN_PREFIX: &str = "arn:aws:iam::";
const REDACTED: &str = "'<redacted>'";

/// Full COPY statement, secrets included.
pub fn copy_statement(source: &CopySource) -> Result<String> {
    render(source, false)
}

/// COPY statement with credentials replaced, safe to log.
pub fn redacted_copy_statement(source: &CopySource) -> Result<String> {
    render(source, true)
}

/// Quote `value` as a single-quoted string literal.
///
/// Quotes are doubled and backslashes escaped. Control characters are
/// rejected outright.
pub fn quote_literal(value: &str) -> Result<String> {
    if let Some(c) = value.chars().find(|c| c.is_control()) {
        return Err(WarehouseError::InvalidSource(format!(
            "control character {:?} in literal",
            c
        )));
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        match c {
            '\'' => quoted.push_str("''"),
            '\\' => quoted.push_str("\\\\"),
            _ => quoted.push(c),
        }
    }
    quoted.push('\'');
    Ok(quoted)
}

fn s3_uri(value: &str, what: &str) -> Result<String> {
    if !value.starts_with(S3_SCHEME) || value.len() == S3_SCHEME.len() {
        return Err(WarehouseError::InvalidSource(format!(
            "{} must be an s3:// URI, got {:?}",
            what, value
        )));
    }
    quote_literal(value)
}

fn region(value: &str) -> Result<String> {
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid {
        return Err(WarehouseError::InvalidSource(format!(
            "invalid region {:?}",
            value
        )));
    }
    quote_literal(value)
}

fn credentials(credentials: Option<&Credentials>, redact: bool) -> Result<String> {
    match credentials {
        Some(Credentials::AccessKey { key_id, secret }) => {
            if key_id.is_empty() || secret.is_empty() {
                return Err(WarehouseError::InvalidSource(
                    "access key id and secret must not be empty".to_string(),
                ));
            }
            if redact {
                Ok(format!(
                    "ACCESS_KEY_ID {} SECRET_ACCESS_KEY {}",
                    REDACTED, REDACTED
                ))
            } else {
                Ok(format!(
                    "ACCESS_KEY_ID {} SECRET_ACCESS_KEY {}",
                    quote_literal(key_id)?,
                    quote_literal(secret)?
                ))
            }
        }
        Some(Credentials::IamRole { arn }) => {
            if !arn.starts_with(IAM_ARN_PREFIX) {
                return Err(WarehouseError::InvalidSource(format!(
                    "IAM role must be an {}… ARN, got {:?}",
                    IAM_ARN_PREFIX, arn
                )));
            }
            Ok(format!("IAM_ROLE {}", quote_literal(arn)?))
        }
        None => Err(WarehouseError::InvalidSource(
            "bulk copy requires credentials".to_string(),
        )),
    }
}

fn render(source: &CopySource, redact: bool) -> Result<String> {
    let uri = match &source.location {
        SourceLocation::S3(uri) => s3_uri(uri, "source location")?,
        SourceLocation::Local(path) => {
            return Err(WarehouseError::InvalidSource(format!(
                "bulk copy needs an s3:// URI, got local path {}",
                path.display()
            )))
        }
    };

    let format = match &source.format {
        DataFormat::Json {
            jsonpaths: Some(jsonpaths),
        } => s3_uri(jsonpaths, "jsonpaths file")?,
        DataFormat::Json { jsonpaths: None } => "'auto'".to_string(),
    };

    let mut lines = vec![
        format!("COPY \"{}\" FROM {}", source.table, uri),
        credentials(source.credentials.as_ref(), redact)?,
        format!("FORMAT AS JSON {}", format),
        format!("REGION {}", region(&source.region)?),
    ];
    if let Some(time_format) = source.time_format {
        lines.push(format!("TIMEFORMAT AS '{}'", time_format.as_str()));
    }
    Ok(lines.join("\n"))
}
