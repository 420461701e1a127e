//! Batch tests against a SQLite file seeded with fixtures.

use pretty_assertions::assert_eq;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tablequery::config::{ConnectionConfig, ExecutorConfig};
use tablequery::db::{Cell, DatabaseBackend, DatabaseConnection, SqliteConnection};
use tablequery::interpolate::{RequestContext, TimeMacros};
use tablequery::query::{
    BatchExecutor, BatchRequest, DatasourceSettings, QueryService, QuerySpec, TableBuilder,
    TimeRange, CANCELLED_MESSAGE,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

async fn seeded_database(dir: &TempDir) -> String {
    let path = dir.path().join("metrics.sqlite");

    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();

    sqlx::query("CREATE TABLE readings (sensor TEXT, ts INTEGER, value REAL, ok BOOLEAN)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO readings VALUES \
         ('north', 60, 1.5, 1), ('north', 90, 2.5, 0), ('south', 150, 4.0, 1)",
    )
    .execute(&pool)
    .await
    .unwrap();
    pool.close().await;

    path.to_string_lossy().into_owned()
}

fn file_request(path: &str, queries: Vec<QuerySpec>) -> BatchRequest {
    BatchRequest {
        datasource: DatasourceSettings {
            backend: Some("sqlite".to_string()),
            url: path.to_string(),
            use_prepared_statements: true,
            ..DatasourceSettings::default()
        },
        time_range: TimeRange {
            from_epoch_ms: 60_000,
            to_epoch_ms: 120_000,
        },
        queries,
    }
}

#[tokio::test]
async fn test_query_seeded_file() {
    let dir = TempDir::new().unwrap();
    let path = seeded_database(&dir).await;

    let request = file_request(
        &path,
        vec![QuerySpec::table(
            "A",
            "SELECT sensor, value FROM readings WHERE $__unixEpochFilter(ts) ORDER BY ts",
        )],
    );

    let response = QueryService::new(ExecutorConfig::default())
        .query(&request, &CancellationToken::new())
        .await
        .unwrap();

    let table = response.results[0].as_table().unwrap();
    assert_eq!(
        table.rows,
        vec![
            vec![Cell::String("north".to_string()), Cell::Double(1.5)],
            vec![Cell::String("north".to_string()), Cell::Double(2.5)],
        ]
    );
    assert_eq!(
        table.meta().unwrap().sql,
        "SELECT sensor, value FROM readings WHERE ts >= 60 AND ts <= 120 ORDER BY ts"
    );
}

#[tokio::test]
async fn test_buffer_growth_keeps_every_row() {
    let dir = TempDir::new().unwrap();
    let path = seeded_database(&dir).await;

    let config = ExecutorConfig {
        initial_row_capacity: 1,
        ..ExecutorConfig::default()
    };

    let request = file_request(
        &path,
        vec![QuerySpec::table("A", "SELECT sensor, ts FROM readings ORDER BY ts")],
    );

    let response = QueryService::new(config)
        .query(&request, &CancellationToken::new())
        .await
        .unwrap();

    let table = response.results[0].as_table().unwrap();
    let ts: Vec<i64> = table.rows.iter().filter_map(|r| r[1].as_i64()).collect();
    assert_eq!(ts, [60, 90, 150]);
}

#[tokio::test]
async fn test_queries_share_one_session() {
    let dir = TempDir::new().unwrap();
    let path = seeded_database(&dir).await;

    let request = file_request(
        &path,
        vec![
            QuerySpec::table("A", "CREATE TEMP TABLE scratch AS SELECT 7 AS n"),
            QuerySpec::table("B", "SELECT n FROM scratch"),
        ],
    );

    let response = QueryService::new(ExecutorConfig::default())
        .query(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.results.len(), 2);
    assert!(response.results[0].as_table().unwrap().rows.is_empty());
    assert_eq!(
        response.results[1].as_table().unwrap().rows,
        vec![vec![Cell::Int64(7)]]
    );
}

#[tokio::test]
async fn test_cancelled_batch_skips_remaining_queries() {
    let dir = TempDir::new().unwrap();
    let path = seeded_database(&dir).await;

    let config = ConnectionConfig {
        backend: DatabaseBackend::Sqlite,
        database: Some(path),
        use_prepared_statements: true,
        ..ConnectionConfig::default()
    };
    let conn = SqliteConnection::connect(&config, &ExecutorConfig::default())
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let macros = TimeMacros;
    let executor = BatchExecutor::new(&macros, TableBuilder::default());
    let response = executor
        .execute(
            &conn,
            &[
                QuerySpec::table("A", "SELECT 1"),
                QuerySpec::table("B", "SELECT 2"),
            ],
            &RequestContext::default(),
            &cancel,
        )
        .await;

    let errors: Vec<_> = response.results.iter().map(|r| r.as_error()).collect();
    assert_eq!(errors, [Some(CANCELLED_MESSAGE), Some(CANCELLED_MESSAGE)]);

    conn.close().await;
}
