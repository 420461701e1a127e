//! End-to-end batch tests against in-memory SQLite.
//!
//! Each batch opens its own connection, so every query is self-contained.

use pretty_assertions::assert_eq;
use tablequery::config::ExecutorConfig;
use tablequery::db::{Cell, CellKind};
use tablequery::error::{Result, TableQueryError};
use tablequery::query::{
    BatchRequest, BatchResponse, DatasourceSettings, QueryFormat, QueryService, QuerySpec,
    TimeRange,
};
use tokio_util::sync::CancellationToken;

const PEOPLE: &str = "WITH people(name, age) AS \
    (VALUES ('ada', 36), ('alan', 41), ('grace', 85)) \
    SELECT name, age FROM people";

fn memory_request(queries: Vec<QuerySpec>) -> BatchRequest {
    BatchRequest {
        datasource: DatasourceSettings {
            backend: Some("sqlite".to_string()),
            url: ":memory:".to_string(),
            use_prepared_statements: true,
            ..DatasourceSettings::default()
        },
        time_range: TimeRange::default(),
        queries,
    }
}

async fn run(request: &BatchRequest) -> Result<BatchResponse> {
    QueryService::new(ExecutorConfig::default())
        .query(request, &CancellationToken::new())
        .await
}

#[tokio::test]
async fn test_table_query_three_rows_two_columns() {
    let response = run(&memory_request(vec![QuerySpec::table("A", PEOPLE)]))
        .await
        .unwrap();

    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].ref_id, "A");

    let table = response.results[0].as_table().unwrap();
    let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["name", "age"]);
    assert_eq!(table.rows.len(), 3);
    assert_eq!(
        table.rows[0],
        vec![Cell::String("ada".to_string()), Cell::Int64(36)]
    );
    assert_eq!(
        table.rows[2],
        vec![Cell::String("grace".to_string()), Cell::Int64(85)]
    );
    assert!(table.meta_json.contains("\"rowCount\":3"));
    assert_eq!(table.meta().unwrap().sql, PEOPLE);
}

#[tokio::test]
async fn test_time_series_format_is_a_query_error() {
    let response = run(&memory_request(vec![
        QuerySpec::table("A", "SELECT 1").with_format(QueryFormat::TimeSeries)
    ]))
    .await
    .unwrap();

    assert_eq!(response.results.len(), 1);
    assert_eq!(
        response.results[0].as_error(),
        Some("time_series not supported")
    );
    assert!(response.results[0].as_table().is_none());
}

#[tokio::test]
async fn test_driver_error_is_isolated() {
    let response = run(&memory_request(vec![
        QuerySpec::table("A", PEOPLE),
        QuerySpec::table("B", "SELECT * FROM missing_table"),
    ]))
    .await
    .unwrap();

    assert_eq!(response.results.len(), 2);
    assert_eq!(response.results[0].as_table().unwrap().rows.len(), 3);

    let error = response.results[1].as_error().unwrap();
    assert!(error.contains("missing_table"), "{error}");
}

#[tokio::test]
async fn test_unrecognised_type_becomes_diagnostic_string() {
    let response = run(&memory_request(vec![QuerySpec::table(
        "A",
        "SELECT 'a' AS label, x'01ff' AS payload, NULL AS missing",
    )]))
    .await
    .unwrap();

    let table = response.results[0].as_table().unwrap();
    assert_eq!(table.rows.len(), 1);

    let row = &table.rows[0];
    assert_eq!(row.len(), table.columns.len());
    assert_eq!(row[0], Cell::String("a".to_string()));
    assert_eq!(row[1].kind(), CellKind::String);
    assert!(row[1].as_str().unwrap().contains("BLOB"));
    assert!(row[2].as_str().unwrap().contains("NULL"));
}

#[tokio::test]
async fn test_zero_rows_keep_columns() {
    let response = run(&memory_request(vec![QuerySpec::table(
        "A",
        "SELECT 1 AS num, 'x' AS label WHERE 0",
    )]))
    .await
    .unwrap();

    let table = response.results[0].as_table().unwrap();
    assert_eq!(table.columns.len(), 2);
    assert!(table.rows.is_empty());
    assert_eq!(table.meta().unwrap().row_count, 0);
}

#[tokio::test]
async fn test_results_follow_request_order() {
    let queries: Vec<QuerySpec> = (0..6)
        .map(|i| {
            let sql = if i % 2 == 0 {
                format!("SELECT {i} AS n")
            } else {
                format!("SELECT FROM WHERE {i}")
            };
            QuerySpec::table(format!("Q{i}"), sql)
        })
        .collect();

    let response = run(&memory_request(queries.clone())).await.unwrap();

    assert_eq!(response.results.len(), queries.len());
    for (i, (query, result)) in queries.iter().zip(&response.results).enumerate() {
        assert_eq!(result.ref_id, query.ref_id);
        if i % 2 == 0 {
            let table = result.as_table().unwrap();
            assert_eq!(table.rows, vec![vec![Cell::Int64(i as i64)]]);
        } else {
            assert!(result.as_error().is_some());
        }
    }
}

#[tokio::test]
async fn test_unprepared_statements() {
    let mut request = memory_request(vec![QuerySpec::table("A", PEOPLE)]);
    request.datasource.use_prepared_statements = false;

    let response = run(&request).await.unwrap();
    assert_eq!(response.results[0].as_table().unwrap().rows.len(), 3);
}

#[tokio::test]
async fn test_macros_are_expanded_before_execution() {
    let mut request = memory_request(vec![QuerySpec::table(
        "A",
        "SELECT $__unixEpochFrom() AS from_s, $__unixEpochTo() AS to_s",
    )]);
    request.time_range = TimeRange {
        from_epoch_ms: 60_000,
        to_epoch_ms: 120_000,
    };

    let response = run(&request).await.unwrap();
    let table = response.results[0].as_table().unwrap();
    assert_eq!(table.rows[0], vec![Cell::Int64(60), Cell::Int64(120)]);
    assert_eq!(table.meta().unwrap().sql, "SELECT 60 AS from_s, 120 AS to_s");
}

#[tokio::test]
async fn test_response_wire_format() {
    let response = run(&memory_request(vec![
        QuerySpec::table("A", "SELECT 'ada' AS name, 1.5 AS score"),
        QuerySpec::table("B", "SELECT 1").with_format(QueryFormat::TimeSeries),
    ]))
    .await
    .unwrap();

    let encoded = response.to_json(false).unwrap();
    let json: serde_json::Value = serde_json::from_str(&encoded).unwrap();
    let results = json["results"].as_array().unwrap();

    assert_eq!(results[0]["refId"], "A");
    assert_eq!(results[0]["table"]["columns"][0]["name"], "name");
    assert_eq!(results[0]["table"]["rows"][0][0]["kind"], "STRING");
    assert_eq!(results[0]["table"]["rows"][0][0]["value"], "ada");
    assert_eq!(results[0]["table"]["rows"][0][1]["kind"], "DOUBLE");
    assert_eq!(results[0]["table"]["rows"][0][1]["value"], 1.5);

    let meta: serde_json::Value =
        serde_json::from_str(results[0]["table"]["metaJson"].as_str().unwrap()).unwrap();
    assert_eq!(meta["rowCount"], 1);

    assert_eq!(results[1]["refId"], "B");
    assert_eq!(results[1]["error"], "time_series not supported");
    assert!(results[1].get("table").is_none());
}

#[tokio::test]
async fn test_unopenable_database_fails_whole_batch() {
    let mut request = memory_request(vec![QuerySpec::table("A", "SELECT 1")]);
    request.datasource.url = "/nonexistent/dir/tablequery.sqlite".to_string();

    let result = run(&request).await;
    assert!(matches!(result, Err(TableQueryError::Connection(_))));
}

#[tokio::test]
async fn test_decoded_request_runs() {
    let json = r#"{
        "datasource": { "backend": "sqlite", "url": ":memory:" },
        "queries": [
            { "datasourceId": "7", "format": "table", "rawSql": "SELECT 42 AS answer",
              "refId": "A", "intervalMs": 1000, "maxDataPoints": 100 }
        ]
    }"#;

    let request = BatchRequest::from_json(json).unwrap();
    let response = run(&request).await.unwrap();
    assert_eq!(
        response.results[0].as_table().unwrap().rows,
        vec![vec![Cell::Int64(42)]]
    );
}
