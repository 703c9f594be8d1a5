//! Warehouse schema definitions using sea-query.
//!
//! Two staging tables mirror the raw JSON datasets. Four dimension tables
//! and one fact table form the star schema populated from them.

use std::fmt;

use sea_query::{ColumnDef, ForeignKey, Iden, Table as TableStmt, TableCreateStatement, TableDropStatement};

use crate::warehouse::Dialect;

mod manager;
mod order;

pub use manager::SchemaManager;
pub use order::{dependency_order, Dependent};

/// Width of free-text columns (titles, names, locations, user agents).
const TEXT_LEN: u32 = 512;
/// Width of catalog identifiers (`SOZCTXZ12AB0182364`).
const ID_LEN: u32 = 32;

/// Activity log staging table. Columns are in jsonpaths order.
#[derive(Iden)]
pub enum StagingEvents {
    #[iden = "staging_events"]
    Table,
    #[iden = "artist"]
    Artist,
    #[iden = "auth"]
    Auth,
    #[iden = "first_name"]
    FirstName,
    #[iden = "gender"]
    Gender,
    #[iden = "item_in_session"]
    ItemInSession,
    #[iden = "last_name"]
    LastName,
    #[iden = "length"]
    Length,
    #[iden = "level"]
    Level,
    #[iden = "location"]
    Location,
    #[iden = "method"]
    Method,
    #[iden = "page"]
    Page,
    #[iden = "registration"]
    Registration,
    #[iden = "session_id"]
    SessionId,
    #[iden = "song"]
    Song,
    #[iden = "status"]
    Status,
    #[iden = "ts"]
    Ts,
    #[iden = "user_agent"]
    UserAgent,
    #[iden = "user_id"]
    UserId,
}

/// Song catalog staging table. Column names match the source JSON keys.
#[derive(Iden)]
pub enum StagingSongs {
    #[iden = "staging_songs"]
    Table,
    #[iden = "num_songs"]
    NumSongs,
    #[iden = "artist_id"]
    ArtistId,
    #[iden = "artist_latitude"]
    ArtistLatitude,
    #[iden = "artist_longitude"]
    ArtistLongitude,
    #[iden = "artist_location"]
    ArtistLocation,
    #[iden = "artist_name"]
    ArtistName,
    #[iden = "song_id"]
    SongId,
    #[iden = "title"]
    Title,
    #[iden = "duration"]
    Duration,
    #[iden = "year"]
    Year,
}

/// User dimension.
#[derive(Iden)]
pub enum Users {
    #[iden = "dim_user"]
    Table,
    #[iden = "user_id"]
    UserId,
    #[iden = "first_name"]
    FirstName,
    #[iden = "last_name"]
    LastName,
    #[iden = "gender"]
    Gender,
}

/// Song dimension.
#[derive(Iden)]
pub enum Songs {
    #[iden = "song"]
    Table,
    #[iden = "song_id"]
    SongId,
    #[iden = "title"]
    Title,
    #[iden = "artist_id"]
    ArtistId,
    #[iden = "year"]
    Year,
    #[iden = "duration"]
    Duration,
}

/// Artist dimension.
#[derive(Iden)]
pub enum Artists {
    #[iden = "artist"]
    Table,
    #[iden = "artist_id"]
    ArtistId,
    #[iden = "name"]
    Name,
    #[iden = "location"]
    Location,
    #[iden = "latitude"]
    Latitude,
    #[iden = "longitude"]
    Longitude,
}

/// Time dimension.
#[derive(Iden)]
pub enum Time {
    #[iden = "time"]
    Table,
    #[iden = "start_time"]
    StartTime,
    #[iden = "hour"]
    Hour,
    #[iden = "day"]
    Day,
    #[iden = "week"]
    Week,
    #[iden = "month"]
    Month,
    #[iden = "year"]
    Year,
    #[iden = "weekday"]
    Weekday,
}

/// Song play fact table.
#[derive(Iden)]
pub enum SongPlays {
    #[iden = "songplay"]
    Table,
    #[iden = "songplay_id"]
    SongplayId,
    #[iden = "start_time"]
    StartTime,
    #[iden = "user_id"]
    UserId,
    #[iden = "level"]
    Level,
    #[iden = "song_id"]
    SongId,
    #[iden = "artist_id"]
    ArtistId,
    #[iden = "session_id"]
    SessionId,
    #[iden = "location"]
    Location,
    #[iden = "user_agent"]
    UserAgent,
}

/// The seven warehouse tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    StagingEvents,
    StagingSongs,
    Artists,
    Songs,
    Users,
    Time,
    SongPlays,
}

impl Table {
    /// Every table, in declaration order.
    pub const ALL: [Table; 7] = [
        Table::StagingEvents,
        Table::StagingSongs,
        Table::Artists,
        Table::Songs,
        Table::Users,
        Table::Time,
        Table::SongPlays,
    ];

    /// The staging tables.
    pub const STAGING: [Table; 2] = [Table::StagingEvents, Table::StagingSongs];

    /// Table name in the warehouse.
    pub fn name(&self) -> &'static str {
        match self {
            Table::StagingEvents => "staging_events",
            Table::StagingSongs => "staging_songs",
            Table::Artists => "artist",
            Table::Songs => "song",
            Table::Users => "dim_user",
            Table::Time => "time",
            Table::SongPlays => "songplay",
        }
    }

    pub fn is_staging(&self) -> bool {
        matches!(self, Table::StagingEvents | Table::StagingSongs)
    }

    /// `CREATE TABLE` for this table, without `IF NOT EXISTS`.
    pub fn create_statement(&self, dialect: Dialect) -> TableCreateStatement {
        match self {
            Table::StagingEvents => TableStmt::create()
                .table(StagingEvents::Table)
                .col(ColumnDef::new(StagingEvents::Artist).string_len(TEXT_LEN))
                .col(ColumnDef::new(StagingEvents::Auth).string_len(32))
                .col(ColumnDef::new(StagingEvents::FirstName).string_len(64))
                .col(ColumnDef::new(StagingEvents::Gender).string_len(8))
                .col(ColumnDef::new(StagingEvents::ItemInSession).integer())
                .col(ColumnDef::new(StagingEvents::LastName).string_len(64))
                .col(ColumnDef::new(StagingEvents::Length).double())
                .col(ColumnDef::new(StagingEvents::Level).string_len(16))
                .col(ColumnDef::new(StagingEvents::Location).string_len(TEXT_LEN))
                .col(ColumnDef::new(StagingEvents::Method).string_len(8))
                .col(ColumnDef::new(StagingEvents::Page).string_len(32))
                .col(ColumnDef::new(StagingEvents::Registration).double())
                .col(ColumnDef::new(StagingEvents::SessionId).integer())
                .col(ColumnDef::new(StagingEvents::Song).string_len(TEXT_LEN))
                .col(ColumnDef::new(StagingEvents::Status).integer())
                .col(ColumnDef::new(StagingEvents::Ts).timestamp())
                .col(ColumnDef::new(StagingEvents::UserAgent).string_len(TEXT_LEN))
                .col(ColumnDef::new(StagingEvents::UserId).integer())
                .to_owned(),
            Table::StagingSongs => TableStmt::create()
                .table(StagingSongs::Table)
                .col(ColumnDef::new(StagingSongs::NumSongs).integer())
                .col(ColumnDef::new(StagingSongs::ArtistId).string_len(ID_LEN))
                .col(ColumnDef::new(StagingSongs::ArtistLatitude).double())
                .col(ColumnDef::new(StagingSongs::ArtistLongitude).double())
                .col(ColumnDef::new(StagingSongs::ArtistLocation).string_len(TEXT_LEN))
                .col(ColumnDef::new(StagingSongs::ArtistName).string_len(TEXT_LEN))
                .col(ColumnDef::new(StagingSongs::SongId).string_len(ID_LEN))
                .col(ColumnDef::new(StagingSongs::Title).string_len(TEXT_LEN))
                .col(ColumnDef::new(StagingSongs::Duration).double())
                .col(ColumnDef::new(StagingSongs::Year).integer())
                .to_owned(),
            Table::Artists => TableStmt::create()
                .table(Artists::Table)
                .col(
                    ColumnDef::new(Artists::ArtistId)
                        .string_len(ID_LEN)
                        .not_null()
                        .primary_key(),
                )
                .col(ColumnDef::new(Artists::Name).string_len(TEXT_LEN))
                .col(ColumnDef::new(Artists::Location).string_len(TEXT_LEN))
                .col(ColumnDef::new(Artists::Latitude).double())
                .col(ColumnDef::new(Artists::Longitude).double())
                .to_owned(),
            Table::Songs => TableStmt::create()
                .table(Songs::Table)
                .col(
                    ColumnDef::new(Songs::SongId)
                        .string_len(ID_LEN)
                        .not_null()
                        .primary_key(),
                )
                .col(ColumnDef::new(Songs::Title).string_len(TEXT_LEN))
                .col(ColumnDef::new(Songs::ArtistId).string_len(ID_LEN))
                .col(ColumnDef::new(Songs::Year).integer())
                .col(ColumnDef::new(Songs::Duration).double())
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_song_artist")
                        .from(Songs::Table, Songs::ArtistId)
                        .to(Artists::Table, Artists::ArtistId),
                )
                .to_owned(),
            Table::Users => TableStmt::create()
                .table(Users::Table)
                .col(
                    ColumnDef::new(Users::UserId)
                        .integer()
                        .not_null()
                        .primary_key(),
                )
                .col(ColumnDef::new(Users::FirstName).string_len(64))
                .col(ColumnDef::new(Users::LastName).string_len(64))
                .col(ColumnDef::new(Users::Gender).string_len(8))
                .to_owned(),
            Table::Time => TableStmt::create()
                .table(Time::Table)
                .col(
                    ColumnDef::new(Time::StartTime)
                        .timestamp()
                        .not_null()
                        .primary_key(),
                )
                .col(ColumnDef::new(Time::Hour).integer())
                .col(ColumnDef::new(Time::Day).integer())
                .col(ColumnDef::new(Time::Week).integer())
                .col(ColumnDef::new(Time::Month).integer())
                .col(ColumnDef::new(Time::Year).integer())
                .col(ColumnDef::new(Time::Weekday).integer())
                .to_owned(),
            Table::SongPlays => {
                let mut songplay_id = ColumnDef::new(SongPlays::SongplayId);
                dialect
                    .identity_column(&mut songplay_id)
                    .not_null()
                    .primary_key();

                TableStmt::create()
                    .table(SongPlays::Table)
                    .col(&mut songplay_id)
                    .col(ColumnDef::new(SongPlays::StartTime).timestamp())
                    .col(ColumnDef::new(SongPlays::UserId).integer())
                    .col(ColumnDef::new(SongPlays::Level).string_len(16))
                    .col(ColumnDef::new(SongPlays::SongId).string_len(ID_LEN))
                    .col(ColumnDef::new(SongPlays::ArtistId).string_len(ID_LEN))
                    .col(ColumnDef::new(SongPlays::SessionId).integer())
                    .col(ColumnDef::new(SongPlays::Location).string_len(TEXT_LEN))
                    .col(ColumnDef::new(SongPlays::UserAgent).string_len(TEXT_LEN))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_songplay_time")
                            .from(SongPlays::Table, SongPlays::StartTime)
                            .to(Time::Table, Time::StartTime),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_songplay_user")
                            .from(SongPlays::Table, SongPlays::UserId)
                            .to(Users::Table, Users::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_songplay_song")
                            .from(SongPlays::Table, SongPlays::SongId)
                            .to(Songs::Table, Songs::SongId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_songplay_artist")
                            .from(SongPlays::Table, SongPlays::ArtistId)
                            .to(Artists::Table, Artists::ArtistId),
                    )
                    .to_owned()
            }
        }
    }

    /// `DROP TABLE IF EXISTS` for this table.
    pub fn drop_statement(&self) -> TableDropStatement {
        TableStmt::drop().table(*self).if_exists().to_owned()
    }
}

impl Dependent for Table {
    fn depends_on(&self) -> &'static [Self] {
        match self {
            Table::Songs => &[Table::Artists],
            Table::SongPlays => &[Table::Time, Table::Users, Table::Songs, Table::Artists],
            _ => &[],
        }
    }
}

impl Iden for Table {
    fn unquoted(&self, s: &mut dyn fmt::Write) {
        write!(s, "{}", self.name()).unwrap();
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
