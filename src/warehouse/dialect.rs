//! SQL dialects.
//!
//! Redshift and PostgreSQL share the sea-query PostgreSQL builders; they
//! differ in identity columns and in COPY support. SQLite is used for local
//! runs and tests.

use std::fmt;

use sea_query::{
    Alias, ColumnDef, Expr, InsertStatement, PostgresQueryBuilder, QueryBuilder, SchemaBuilder,
    SelectStatement, SimpleExpr, SqliteQueryBuilder, TableCreateStatement, TableDropStatement,
};
use sea_query_binder::SqlxBinder;
use serde::Deserialize;

use super::Statement;

/// SQL dialect of the target warehouse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Amazon Redshift (PostgreSQL wire protocol, bulk COPY from S3).
    #[default]
    Redshift,
    /// Vanilla PostgreSQL.
    Postgres,
    /// SQLite.
    Sqlite,
}

/// Calendar fields extracted from a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Hour,
    Day,
    Week,
    Month,
    Year,
    /// Day of week, Sunday = 0.
    Weekday,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Redshift => "redshift",
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Whether the warehouse is reached over the PostgreSQL wire protocol.
    pub fn is_wire_protocol(&self) -> bool {
        matches!(self, Dialect::Redshift | Dialect::Postgres)
    }

    /// Whether the warehouse can bulk-copy from object storage.
    pub fn supports_bulk_copy(&self) -> bool {
        matches!(self, Dialect::Redshift)
    }

    fn query_builder(&self) -> &'static dyn QueryBuilder {
        match self {
            Dialect::Redshift | Dialect::Postgres => &PostgresQueryBuilder,
            Dialect::Sqlite => &SqliteQueryBuilder,
        }
    }

    fn schema_builder(&self) -> &'static dyn SchemaBuilder {
        match self {
            Dialect::Redshift | Dialect::Postgres => &PostgresQueryBuilder,
            Dialect::Sqlite => &SqliteQueryBuilder,
        }
    }

    /// Render an INSERT with its values bound.
    pub fn build_insert(&self, stmt: &InsertStatement) -> Statement {
        let (sql, values) = stmt.build_any_sqlx(self.query_builder());
        Statement::bound(sql, values)
    }

    /// Render a SELECT with its values bound.
    pub fn build_select(&self, stmt: &SelectStatement) -> Statement {
        let (sql, values) = stmt.build_any_sqlx(self.query_builder());
        Statement::bound(sql, values)
    }

    /// Render a CREATE TABLE.
    pub fn build_table_create(&self, stmt: &TableCreateStatement) -> Statement {
        Statement::raw(stmt.build_any(self.schema_builder()))
    }

    /// Render a DROP TABLE.
    pub fn build_table_drop(&self, stmt: &TableDropStatement) -> Statement {
        Statement::raw(stmt.build_any(self.schema_builder()))
    }

    /// Give `column` an auto-incrementing integer type.
    ///
    /// Redshift has no `serial`; it uses `IDENTITY(seed, step)`.
    pub fn identity_column<'a>(&self, column: &'a mut ColumnDef) -> &'a mut ColumnDef {
        match self {
            Dialect::Redshift => column.custom(Alias::new("INT IDENTITY(1,1)")),
            Dialect::Postgres | Dialect::Sqlite => column.integer().auto_increment(),
        }
    }

    /// Integer calendar field of the timestamp column `column`.
    pub fn date_part(&self, part: DatePart, column: &str) -> SimpleExpr {
        match self {
            Dialect::Redshift | Dialect::Postgres => {
                let field = match part {
                    DatePart::Hour => "HOUR",
                    DatePart::Day => "DAY",
                    DatePart::Week => "WEEK",
                    DatePart::Month => "MONTH",
                    DatePart::Year => "YEAR",
                    DatePart::Weekday => "DOW",
                };
                Expr::cust(format!(
                    "CAST(EXTRACT({} FROM \"{}\") AS INTEGER)",
                    field, column
                ))
            }
            Dialect::Sqlite => {
                // %W counts weeks from the first Monday of the year, which
                // differs from ISO weeks near year boundaries.
                let format = match part {
                    DatePart::Hour => "%H",
                    DatePart::Day => "%d",
                    DatePart::Week => "%W",
                    DatePart::Month => "%m",
                    DatePart::Year => "%Y",
                    DatePart::Weekday => "%w",
                };
                Expr::cust(format!(
                    "CAST(strftime('{}', \"{}\") AS INTEGER)",
                    format, column
                ))
            }
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
