//! Populating the star schema from the staging tables.

use std::fmt;

use sea_query::{Expr, Func, Iden, InsertStatement, Query, SelectStatement, SimpleExpr};
use tracing::info;

use crate::schema::{
    dependency_order, Artists, Dependent, SongPlays, Songs, StagingEvents, StagingSongs, Table,
    Time, Users,
};
use crate::warehouse::{DatePart, Dialect, Result, Statement, Warehouse};

/// Page value of an event that played a song.
pub const NEXT_SONG: &str = "NextSong";

/// One INSERT…SELECT into a dimension or fact table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformStep {
    SongPlays,
    Users,
    Songs,
    Artists,
    Time,
}

impl TransformStep {
    /// Every step, in listing order. Execution order is derived from
    /// dependencies, see [`Transformer::execution_order`].
    pub const ALL: [TransformStep; 5] = [
        TransformStep::SongPlays,
        TransformStep::Users,
        TransformStep::Songs,
        TransformStep::Artists,
        TransformStep::Time,
    ];

    /// Table the step inserts into.
    pub fn target(&self) -> Table {
        match self {
            TransformStep::SongPlays => Table::SongPlays,
            TransformStep::Users => Table::Users,
            TransformStep::Songs => Table::Songs,
            TransformStep::Artists => Table::Artists,
            TransformStep::Time => Table::Time,
        }
    }

    /// The step's statement rendered for `dialect`, with its filters bound.
    pub fn statement(&self, dialect: Dialect) -> Result<Statement> {
        let insert = match self {
            TransformStep::SongPlays => song_plays()?,
            TransformStep::Users => users()?,
            TransformStep::Songs => songs()?,
            TransformStep::Artists => artists()?,
            TransformStep::Time => time(dialect)?,
        };
        Ok(dialect.build_insert(&insert))
    }
}

impl Dependent for TransformStep {
    fn depends_on(&self) -> &'static [Self] {
        match self {
            TransformStep::SongPlays => &[
                TransformStep::Users,
                TransformStep::Songs,
                TransformStep::Artists,
                TransformStep::Time,
            ],
            TransformStep::Songs => &[TransformStep::Artists],
            _ => &[],
        }
    }
}

impl fmt::Display for TransformStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.target().name())
    }
}

/// `SELECT <key> FROM <table>`, for anti-joins against existing rows.
fn existing_keys<T, C>(table: T, key: C) -> SelectStatement
where
    T: Iden + 'static,
    C: Iden + 'static,
{
    Query::select().column(key).from(table).to_owned()
}

/// One deterministic value of `column` per group. Staged rows sharing a key
/// may disagree on every other attribute.
fn pick<C>(column: C) -> SimpleExpr
where
    C: Iden + 'static,
{
    Func::max(Expr::col(column)).into()
}

fn users() -> Result<InsertStatement> {
    let select = Query::select()
        .column(StagingEvents::UserId)
        .exprs([
            pick(StagingEvents::FirstName),
            pick(StagingEvents::LastName),
            pick(StagingEvents::Gender),
        ])
        .from(StagingEvents::Table)
        .and_where(Expr::col(StagingEvents::Page).eq(NEXT_SONG))
        .and_where(Expr::col(StagingEvents::UserId).is_not_null())
        .and_where(
            Expr::col(StagingEvents::UserId)
                .not_in_subquery(existing_keys(Users::Table, Users::UserId)),
        )
        .group_by_col(StagingEvents::UserId)
        .to_owned();

    Ok(Query::insert()
        .into_table(Users::Table)
        .columns([
            Users::UserId,
            Users::FirstName,
            Users::LastName,
            Users::Gender,
        ])
        .select_from(select)?
        .to_owned())
}

fn songs() -> Result<InsertStatement> {
    let select = Query::select()
        .column(StagingSongs::SongId)
        .exprs([
            pick(StagingSongs::Title),
            pick(StagingSongs::ArtistId),
            pick(StagingSongs::Year),
            pick(StagingSongs::Duration),
        ])
        .from(StagingSongs::Table)
        .and_where(Expr::col(StagingSongs::SongId).is_not_null())
        .and_where(
            Expr::col(StagingSongs::SongId)
                .not_in_subquery(existing_keys(Songs::Table, Songs::SongId)),
        )
        .group_by_col(StagingSongs::SongId)
        .to_owned();

    Ok(Query::insert()
        .into_table(Songs::Table)
        .columns([
            Songs::SongId,
            Songs::Title,
            Songs::ArtistId,
            Songs::Year,
            Songs::Duration,
        ])
        .select_from(select)?
        .to_owned())
}

fn artists() -> Result<InsertStatement> {
    let select = Query::select()
        .column(StagingSongs::ArtistId)
        .exprs([
            pick(StagingSongs::ArtistName),
            pick(StagingSongs::ArtistLocation),
            pick(StagingSongs::ArtistLatitude),
            pick(StagingSongs::ArtistLongitude),
        ])
        .from(StagingSongs::Table)
        .and_where(Expr::col(StagingSongs::ArtistId).is_not_null())
        .and_where(
            Expr::col(StagingSongs::ArtistId)
                .not_in_subquery(existing_keys(Artists::Table, Artists::ArtistId)),
        )
        .group_by_col(StagingSongs::ArtistId)
        .to_owned();

    Ok(Query::insert()
        .into_table(Artists::Table)
        .columns([
            Artists::ArtistId,
            Artists::Name,
            Artists::Location,
            Artists::Latitude,
            Artists::Longitude,
        ])
        .select_from(select)?
        .to_owned())
}

fn time(dialect: Dialect) -> Result<InsertStatement> {
    let ts = StagingEvents::Ts.to_string();
    let select = Query::select()
        .distinct()
        .column(StagingEvents::Ts)
        .expr(dialect.date_part(DatePart::Hour, &ts))
        .expr(dialect.date_part(DatePart::Day, &ts))
        .expr(dialect.date_part(DatePart::Week, &ts))
        .expr(dialect.date_part(DatePart::Month, &ts))
        .expr(dialect.date_part(DatePart::Year, &ts))
        .expr(dialect.date_part(DatePart::Weekday, &ts))
        .from(StagingEvents::Table)
        .and_where(Expr::col(StagingEvents::Page).eq(NEXT_SONG))
        .and_where(Expr::col(StagingEvents::Ts).is_not_null())
        .and_where(
            Expr::col(StagingEvents::Ts)
                .not_in_subquery(existing_keys(Time::Table, Time::StartTime)),
        )
        .to_owned();

    Ok(Query::insert()
        .into_table(Time::Table)
        .columns([
            Time::StartTime,
            Time::Hour,
            Time::Day,
            Time::Week,
            Time::Month,
            Time::Year,
            Time::Weekday,
        ])
        .select_from(select)?
        .to_owned())
}

/// Events joined to the catalog on (title, artist name). Events without a
/// matching song are dropped.
fn song_plays() -> Result<InsertStatement> {
    let select = Query::select()
        .columns([
            (StagingEvents::Table, StagingEvents::Ts),
            (StagingEvents::Table, StagingEvents::UserId),
            (StagingEvents::Table, StagingEvents::Level),
        ])
        .columns([
            (StagingSongs::Table, StagingSongs::SongId),
            (StagingSongs::Table, StagingSongs::ArtistId),
        ])
        .columns([
            (StagingEvents::Table, StagingEvents::SessionId),
            (StagingEvents::Table, StagingEvents::Location),
            (StagingEvents::Table, StagingEvents::UserAgent),
        ])
        .from(StagingEvents::Table)
        .inner_join(
            StagingSongs::Table,
            Expr::col((StagingEvents::Table, StagingEvents::Song))
                .equals((StagingSongs::Table, StagingSongs::Title))
                .and(
                    Expr::col((StagingEvents::Table, StagingEvents::Artist))
                        .equals((StagingSongs::Table, StagingSongs::ArtistName)),
                ),
        )
        .and_where(Expr::col((StagingEvents::Table, StagingEvents::Page)).eq(NEXT_SONG))
        .to_owned();

    Ok(Query::insert()
        .into_table(SongPlays::Table)
        .columns([
            SongPlays::StartTime,
            SongPlays::UserId,
            SongPlays::Level,
            SongPlays::SongId,
            SongPlays::ArtistId,
            SongPlays::SessionId,
            SongPlays::Location,
            SongPlays::UserAgent,
        ])
        .select_from(select)?
        .to_owned())
}

/// Result of one transform step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformOutcome {
    pub step: TransformStep,
    pub rows: u64,
}

/// Runs the transform steps against a warehouse.
#[derive(Debug, Clone)]
pub struct Transformer {
    steps: Vec<TransformStep>,
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformer {
    pub fn new() -> Self {
        Self {
            steps: TransformStep::ALL.to_vec(),
        }
    }

    /// Dimensions before the fact table; `artist` before `song`.
    pub fn execution_order(&self) -> Result<Vec<TransformStep>> {
        dependency_order(&self.steps)
    }

    /// Run every step, each as its own commit unit.
    ///
    /// Inside an open transaction the steps join it instead.
    pub async fn populate_dimensions_and_facts(
        &self,
        warehouse: &mut dyn Warehouse,
    ) -> Result<Vec<TransformOutcome>> {
        let dialect = warehouse.dialect();
        let mut outcomes = Vec::with_capacity(self.steps.len());
        for step in self.execution_order()? {
            let statement = step.statement(dialect)?;
            let rows = warehouse.execute_unit(vec![statement]).await?;
            info!(table = %step, rows, "Transform step complete");
            outcomes.push(TransformOutcome { step, rows });
        }
        Ok(outcomes)
    }
}
