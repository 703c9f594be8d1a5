//! Songplay warehouse ETL
//!
//! Loads raw activity logs and a song catalog into warehouse staging tables,
//! then transforms them into a star schema: `songplay` facts with `dim_user`,
//! `song`, `artist` and `time` dimensions.
//!
//! Runs against Amazon Redshift (bulk `COPY` from S3), PostgreSQL, or SQLite
//! (local JSON staging).

pub mod config;
pub mod pipeline;
pub mod schema;
pub mod utils;
pub mod warehouse;
