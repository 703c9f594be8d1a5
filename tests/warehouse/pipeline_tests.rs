//! Pipeline contract tests.
//!
//! Every test resets the schema first, so they can share one connection.

use chrono::{DateTime, NaiveDateTime};
use sea_query::{Asterisk, Expr, Iden, Query, SelectStatement};
use serde_json::json;

use songplay_warehouse::config::CommitMode;
use songplay_warehouse::pipeline::{
    CopySource, Credentials, DataFormat, Loader, Pipeline, SourceLocation, Stage, StagingTable,
    Transformer,
};
use songplay_warehouse::schema::{
    Artists, SchemaManager, SongPlays, Songs, Table, Time, Users,
};
use songplay_warehouse::warehouse::{Warehouse, WarehouseError};

use super::fixtures::{event, next_song, song, Dataset, CANONICAL_TS};

const ALL_STAGES: [Stage; 2] = [Stage::Load, Stage::Transform];

async fn prepare(warehouse: &mut dyn Warehouse) {
    SchemaManager::new()
        .reset(warehouse)
        .await
        .expect("schema reset should succeed");
}

fn pipeline(sources: Vec<CopySource>) -> Pipeline {
    Pipeline::new(Loader::new(sources), Transformer::new())
}

fn timestamp(millis: i64) -> NaiveDateTime {
    DateTime::from_timestamp_millis(millis)
        .expect("timestamp in range")
        .naive_utc()
}

async fn count(warehouse: &mut dyn Warehouse, table: Table) -> i64 {
    warehouse
        .count_rows(table)
        .await
        .expect("count should succeed")
}

async fn count_where(warehouse: &mut dyn Warehouse, select: SelectStatement) -> i64 {
    let statement = warehouse.dialect().build_select(&select);
    warehouse
        .fetch_count(statement)
        .await
        .expect("count query should succeed")
}

async fn distinct_keys<T: Iden + 'static, K: Iden>(
    warehouse: &mut dyn Warehouse,
    table: T,
    key: K,
) -> i64 {
    let select = Query::select()
        .expr(Expr::cust(format!("COUNT(DISTINCT \"{}\")", key.to_string())))
        .from(table)
        .to_owned();
    count_where(warehouse, select).await
}

/// Fact rows whose `fact_key` is missing from the dimension.
async fn orphans<K, T, P>(warehouse: &mut dyn Warehouse, fact_key: K, dimension: T, key: P) -> i64
where
    K: Iden + 'static,
    T: Iden + 'static,
    P: Iden + 'static,
{
    let select = Query::select()
        .expr(Expr::col(Asterisk).count())
        .from(SongPlays::Table)
        .and_where(
            Expr::col(fact_key)
                .not_in_subquery(Query::select().column(key).from(dimension).to_owned()),
        )
        .to_owned();
    count_where(warehouse, select).await
}

// =============================================================================
// Schema manager
// =============================================================================

pub async fn test_create_twice_fails(warehouse: &mut dyn Warehouse) {
    prepare(warehouse).await;

    let err = SchemaManager::new()
        .create_all(warehouse)
        .await
        .expect_err("creating existing tables should fail");
    assert!(
        matches!(err, WarehouseError::Database(_)),
        "unexpected error: {err}"
    );
}

pub async fn test_drop_all_is_idempotent(warehouse: &mut dyn Warehouse) {
    prepare(warehouse).await;
    let manager = SchemaManager::new();

    manager.drop_all(warehouse).await.expect("first drop");
    manager.drop_all(warehouse).await.expect("second drop");
    manager.create_all(warehouse).await.expect("create after drop");

    for table in Table::ALL {
        assert_eq!(count(warehouse, table).await, 0, "{table} should be empty");
    }
}

// =============================================================================
// Transforms
// =============================================================================

pub async fn test_canonical_songplay(warehouse: &mut dyn Warehouse) {
    prepare(warehouse).await;
    let mut data = Dataset::new();
    let sources = vec![
        data.events(&[next_song(7, "Test Song", "Test Artist", CANONICAL_TS)]),
        data.songs(&[song("S1", "Test Song", "A1", "Test Artist")]),
    ];

    let report = pipeline(sources)
        .run(warehouse, &ALL_STAGES)
        .await
        .expect("pipeline should succeed");

    assert_eq!(report.rows_for(Table::StagingEvents), 1);
    assert_eq!(report.rows_for(Table::SongPlays), 1);
    assert_eq!(report.count_of(Table::SongPlays), Some(1));

    let start_time = timestamp(CANONICAL_TS);
    let play = Query::select()
        .expr(Expr::col(Asterisk).count())
        .from(SongPlays::Table)
        .and_where(Expr::col(SongPlays::SongId).eq("S1"))
        .and_where(Expr::col(SongPlays::ArtistId).eq("A1"))
        .and_where(Expr::col(SongPlays::UserId).eq(7))
        .and_where(Expr::col(SongPlays::StartTime).eq(start_time))
        .and_where(Expr::col(SongPlays::Level).eq("paid"))
        .and_where(Expr::col(SongPlays::SessionId).eq(42))
        .and_where(Expr::col(SongPlays::UserAgent).eq("Mozilla/5.0"))
        .to_owned();
    assert_eq!(count_where(warehouse, play).await, 1);

    let time = Query::select()
        .expr(Expr::col(Asterisk).count())
        .from(Time::Table)
        .and_where(Expr::col(Time::StartTime).eq(start_time))
        .and_where(Expr::col(Time::Hour).eq(1))
        .and_where(Expr::col(Time::Day).eq(9))
        .and_where(Expr::col(Time::Week).eq(36))
        .and_where(Expr::col(Time::Month).eq(9))
        .and_where(Expr::col(Time::Year).eq(2001))
        .and_where(Expr::col(Time::Weekday).eq(0))
        .to_owned();
    assert_eq!(count_where(warehouse, time).await, 1);

    let user = Query::select()
        .expr(Expr::col(Asterisk).count())
        .from(Users::Table)
        .and_where(Expr::col(Users::UserId).eq(7))
        .and_where(Expr::col(Users::FirstName).eq("Ada"))
        .to_owned();
    assert_eq!(count_where(warehouse, user).await, 1);

    let artist = Query::select()
        .expr(Expr::col(Asterisk).count())
        .from(Artists::Table)
        .and_where(Expr::col(Artists::ArtistId).eq("A1"))
        .and_where(Expr::col(Artists::Name).eq("Test Artist"))
        .to_owned();
    assert_eq!(count_where(warehouse, artist).await, 1);
}

pub async fn test_login_event_contributes_nothing(warehouse: &mut dyn Warehouse) {
    prepare(warehouse).await;
    let mut data = Dataset::new();
    let sources = vec![
        data.events(&[event(
            "Login",
            json!(8),
            "Test Song",
            "Test Artist",
            CANONICAL_TS,
        )]),
        data.songs(&[song("S1", "Test Song", "A1", "Test Artist")]),
    ];

    pipeline(sources)
        .run(warehouse, &ALL_STAGES)
        .await
        .expect("pipeline should succeed");

    assert_eq!(count(warehouse, Table::StagingEvents).await, 1);
    assert_eq!(count(warehouse, Table::Users).await, 0);
    assert_eq!(count(warehouse, Table::Time).await, 0);
    assert_eq!(count(warehouse, Table::SongPlays).await, 0);
    assert_eq!(count(warehouse, Table::Songs).await, 1);
    assert_eq!(count(warehouse, Table::Artists).await, 1);
}

pub async fn test_unmatched_event_is_dropped(warehouse: &mut dyn Warehouse) {
    prepare(warehouse).await;
    let mut data = Dataset::new();
    let sources = vec![
        data.events(&[next_song(7, "Unknown Song", "Test Artist", CANONICAL_TS)]),
        data.songs(&[song("S1", "Test Song", "A1", "Test Artist")]),
    ];

    pipeline(sources)
        .run(warehouse, &ALL_STAGES)
        .await
        .expect("pipeline should succeed");

    assert_eq!(count(warehouse, Table::SongPlays).await, 0);
    assert_eq!(count(warehouse, Table::Users).await, 1);
    assert_eq!(count(warehouse, Table::Time).await, 1);
}

pub async fn test_logged_out_events_are_skipped(warehouse: &mut dyn Warehouse) {
    prepare(warehouse).await;
    let mut data = Dataset::new();
    let sources = vec![data.events(&[
        event("Home", json!(""), "", "", CANONICAL_TS),
        next_song(7, "Test Song", "Test Artist", CANONICAL_TS + 1_000),
    ])];

    pipeline(sources)
        .run(warehouse, &ALL_STAGES)
        .await
        .expect("pipeline should succeed");

    assert_eq!(count(warehouse, Table::StagingEvents).await, 2);
    assert_eq!(count(warehouse, Table::Users).await, 1);
}

pub async fn test_keys_unique_and_referenced(warehouse: &mut dyn Warehouse) {
    prepare(warehouse).await;
    let mut data = Dataset::new();
    let sources = vec![
        data.events(&[
            next_song(7, "Test Song", "Test Artist", CANONICAL_TS),
            next_song(7, "Test Song", "Test Artist", CANONICAL_TS + 60_000),
            next_song(9, "Other Song", "Other Artist", CANONICAL_TS + 60_000),
            next_song(9, "Missing Song", "Nobody", CANONICAL_TS + 120_000),
        ]),
        data.songs(&[
            song("S1", "Test Song", "A1", "Test Artist"),
            song("S2", "Other Song", "A2", "Other Artist"),
            song("S3", "Another Song", "A2", "Other Artist"),
        ]),
    ];

    pipeline(sources)
        .run(warehouse, &ALL_STAGES)
        .await
        .expect("pipeline should succeed");

    assert_eq!(count(warehouse, Table::StagingSongs).await, 3);
    assert_eq!(count(warehouse, Table::Users).await, 2);
    assert_eq!(count(warehouse, Table::Songs).await, 3);
    assert_eq!(count(warehouse, Table::Artists).await, 2);
    assert_eq!(count(warehouse, Table::Time).await, 3);
    assert_eq!(count(warehouse, Table::SongPlays).await, 3);

    assert_eq!(distinct_keys(warehouse, Users::Table, Users::UserId).await, 2);
    assert_eq!(distinct_keys(warehouse, Songs::Table, Songs::SongId).await, 3);
    assert_eq!(
        distinct_keys(warehouse, Artists::Table, Artists::ArtistId).await,
        2
    );
    assert_eq!(distinct_keys(warehouse, Time::Table, Time::StartTime).await, 3);

    assert_eq!(
        orphans(warehouse, SongPlays::StartTime, Time::Table, Time::StartTime).await,
        0
    );
    assert_eq!(
        orphans(warehouse, SongPlays::UserId, Users::Table, Users::UserId).await,
        0
    );
    assert_eq!(
        orphans(warehouse, SongPlays::SongId, Songs::Table, Songs::SongId).await,
        0
    );
    assert_eq!(
        orphans(warehouse, SongPlays::ArtistId, Artists::Table, Artists::ArtistId).await,
        0
    );
}

pub async fn test_conflicting_attributes_keep_one_row_per_key(warehouse: &mut dyn Warehouse) {
    prepare(warehouse).await;
    let mut data = Dataset::new();

    let mut renamed = next_song(7, "Test Song", "Test Artist", CANONICAL_TS + 60_000);
    renamed["firstName"] = json!("Augusta");
    let mut featuring = song("S2", "Other Song", "A1", "Test Artist feat. X");
    featuring["artist_location"] = json!("");
    featuring["artist_latitude"] = json!(null);

    let sources = vec![
        data.events(&[
            next_song(7, "Test Song", "Test Artist", CANONICAL_TS),
            renamed,
        ]),
        data.songs(&[song("S1", "Test Song", "A1", "Test Artist"), featuring]),
    ];

    pipeline(sources)
        .run(warehouse, &ALL_STAGES)
        .await
        .expect("pipeline should succeed despite conflicting attributes");

    assert_eq!(count(warehouse, Table::StagingSongs).await, 2);
    assert_eq!(count(warehouse, Table::Artists).await, 1);
    assert_eq!(count(warehouse, Table::Users).await, 1);
    assert_eq!(count(warehouse, Table::Songs).await, 2);
    assert_eq!(count(warehouse, Table::SongPlays).await, 2);
    assert_eq!(
        orphans(warehouse, SongPlays::ArtistId, Artists::Table, Artists::ArtistId).await,
        0
    );

    // Non-empty attributes win over empty and missing ones.
    let located = Query::select()
        .expr(Expr::col(Asterisk).count())
        .from(Artists::Table)
        .and_where(Expr::col(Artists::Location).eq("London"))
        .and_where(Expr::col(Artists::Latitude).is_not_null())
        .to_owned();
    assert_eq!(count_where(warehouse, located).await, 1);
}

pub async fn test_transform_twice_adds_no_duplicate_keys(warehouse: &mut dyn Warehouse) {
    prepare(warehouse).await;
    let mut data = Dataset::new();
    let sources = vec![
        data.events(&[next_song(7, "Test Song", "Test Artist", CANONICAL_TS)]),
        data.songs(&[song("S1", "Test Song", "A1", "Test Artist")]),
    ];
    let pipeline = pipeline(sources);

    pipeline
        .run(warehouse, &ALL_STAGES)
        .await
        .expect("first run should succeed");
    let report = pipeline
        .run(warehouse, &[Stage::Transform])
        .await
        .expect("second transform should succeed");

    assert_eq!(report.rows_for(Table::Users), 0);
    assert_eq!(report.rows_for(Table::Time), 0);
    assert_eq!(count(warehouse, Table::Users).await, 1);
    assert_eq!(count(warehouse, Table::Songs).await, 1);
    assert_eq!(count(warehouse, Table::Artists).await, 1);
    assert_eq!(count(warehouse, Table::Time).await, 1);
    // Facts accumulate on every run.
    assert_eq!(count(warehouse, Table::SongPlays).await, 2);
}

// =============================================================================
// Commit policy
// =============================================================================

async fn drop_fact_table(warehouse: &mut dyn Warehouse) {
    let statement = warehouse
        .dialect()
        .build_table_drop(&Table::SongPlays.drop_statement());
    warehouse.execute(statement).await.expect("drop songplay");
}

pub async fn test_single_transaction_rolls_back(warehouse: &mut dyn Warehouse) {
    prepare(warehouse).await;
    drop_fact_table(warehouse).await;
    let mut data = Dataset::new();
    let sources = vec![
        data.events(&[next_song(7, "Test Song", "Test Artist", CANONICAL_TS)]),
        data.songs(&[song("S1", "Test Song", "A1", "Test Artist")]),
    ];

    let result = pipeline(sources)
        .with_commit(CommitMode::SingleTransaction)
        .run(warehouse, &ALL_STAGES)
        .await;

    assert!(result.is_err(), "missing fact table should fail the run");
    assert!(!warehouse.in_transaction());
    assert_eq!(count(warehouse, Table::StagingEvents).await, 0);
    assert_eq!(count(warehouse, Table::StagingSongs).await, 0);
    assert_eq!(count(warehouse, Table::Users).await, 0);
    assert_eq!(count(warehouse, Table::Artists).await, 0);
}

pub async fn test_per_statement_keeps_committed_units(warehouse: &mut dyn Warehouse) {
    prepare(warehouse).await;
    drop_fact_table(warehouse).await;
    let mut data = Dataset::new();
    let sources = vec![
        data.events(&[next_song(7, "Test Song", "Test Artist", CANONICAL_TS)]),
        data.songs(&[song("S1", "Test Song", "A1", "Test Artist")]),
    ];

    let result = pipeline(sources)
        .with_commit(CommitMode::PerStatement)
        .run(warehouse, &ALL_STAGES)
        .await;

    assert!(result.is_err(), "missing fact table should fail the run");
    assert!(!warehouse.in_transaction());
    assert_eq!(count(warehouse, Table::StagingEvents).await, 1);
    assert_eq!(count(warehouse, Table::StagingSongs).await, 1);
    assert_eq!(count(warehouse, Table::Users).await, 1);
    assert_eq!(count(warehouse, Table::Time).await, 1);
}

// =============================================================================
// Staging
// =============================================================================

pub async fn test_reset_staging_prevents_accumulation(warehouse: &mut dyn Warehouse) {
    prepare(warehouse).await;
    let mut data = Dataset::new();
    let sources = vec![data.events(&[
        next_song(7, "Test Song", "Test Artist", CANONICAL_TS),
        next_song(8, "Test Song", "Test Artist", CANONICAL_TS + 1),
    ])];

    let resetting = pipeline(sources.clone());
    resetting.run(warehouse, &[Stage::Load]).await.expect("load");
    resetting.run(warehouse, &[Stage::Load]).await.expect("reload");
    assert_eq!(count(warehouse, Table::StagingEvents).await, 2);

    let appending = pipeline(sources).with_reset_staging(false);
    appending.run(warehouse, &[Stage::Load]).await.expect("append");
    assert_eq!(count(warehouse, Table::StagingEvents).await, 4);
}

pub async fn test_s3_source_requires_bulk_copy(warehouse: &mut dyn Warehouse) {
    prepare(warehouse).await;
    let source = CopySource {
        table: StagingTable::Songs,
        location: SourceLocation::S3("s3://udacity-dend/song_data".to_string()),
        credentials: Some(Credentials::IamRole {
            arn: "arn:aws:iam::123456789012:role/dwhRole".to_string(),
        }),
        format: DataFormat::Json { jsonpaths: None },
        region: "us-west-2".to_string(),
        time_format: None,
    };

    let err = Loader::new(vec![source.clone()])
        .load_staging(warehouse, &source)
        .await
        .expect_err("bulk copy should be unsupported");
    assert!(
        matches!(err, WarehouseError::Unsupported { .. }),
        "unexpected error: {err}"
    );
}

pub async fn test_malformed_source_fails_load(warehouse: &mut dyn Warehouse) {
    prepare(warehouse).await;
    let mut data = Dataset::new();
    let source = data.events(&[json!({"page": "NextSong", "userId": "not a number"})]);

    let err = pipeline(vec![source])
        .run(warehouse, &[Stage::Load])
        .await
        .expect_err("malformed record should fail");
    assert!(
        matches!(err, WarehouseError::Json { .. }),
        "unexpected error: {err}"
    );
    assert_eq!(count(warehouse, Table::StagingEvents).await, 0);
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all pipeline contract tests against a warehouse.
#[macro_export]
macro_rules! run_pipeline_tests {
    ($warehouse:expr) => {
        use $crate::warehouse::pipeline_tests::*;

        // schema manager
        test_create_twice_fails($warehouse).await;
        println!("  test_create_twice_fails: PASSED");

        test_drop_all_is_idempotent($warehouse).await;
        println!("  test_drop_all_is_idempotent: PASSED");

        // transforms
        test_canonical_songplay($warehouse).await;
        println!("  test_canonical_songplay: PASSED");

        test_login_event_contributes_nothing($warehouse).await;
        println!("  test_login_event_contributes_nothing: PASSED");

        test_unmatched_event_is_dropped($warehouse).await;
        println!("  test_unmatched_event_is_dropped: PASSED");

        test_logged_out_events_are_skipped($warehouse).await;
        println!("  test_logged_out_events_are_skipped: PASSED");

        test_keys_unique_and_referenced($warehouse).await;
        println!("  test_keys_unique_and_referenced: PASSED");

        test_conflicting_attributes_keep_one_row_per_key($warehouse).await;
        println!("  test_conflicting_attributes_keep_one_row_per_key: PASSED");

        test_transform_twice_adds_no_duplicate_keys($warehouse).await;
        println!("  test_transform_twice_adds_no_duplicate_keys: PASSED");

        // commit policy
        test_single_transaction_rolls_back($warehouse).await;
        println!("  test_single_transaction_rolls_back: PASSED");

        test_per_statement_keeps_committed_units($warehouse).await;
        println!("  test_per_statement_keeps_committed_units: PASSED");

        // staging
        test_reset_staging_prevents_accumulation($warehouse).await;
        println!("  test_reset_staging_prevents_accumulation: PASSED");

        test_s3_source_requires_bulk_copy($warehouse).await;
        println!("  test_s3_source_requires_bulk_copy: PASSED");

        test_malformed_source_fails_load($warehouse).await;
        println!("  test_malformed_source_fails_load: PASSED");
    };
}
