//! Guarded execution against a live PostgreSQL database.
//!
//! Skipped unless DATABASE_URL is set.

use serde_json::json;

use supaguard::db::{PostgresChannel, SqlChannel};
use supaguard::error::GuardError;
use supaguard::query::{ExecutionResult, QueryExecutor};
use supaguard::safety::{QueryValidator, Rejection};

async fn get_test_channel() -> Option<PostgresChannel> {
    let url = std::env::var("DATABASE_URL").ok()?;
    PostgresChannel::connect(&url, 2).await.ok()
}

#[tokio::test]
async fn test_row_cap_applies() {
    let Some(channel) = get_test_channel().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let validator = QueryValidator::new();
    let executor = QueryExecutor::new(&channel, &validator);

    let outcome = executor
        .execute("SELECT n FROM generate_series(1, 1000) AS n")
        .await
        .into_result()
        .unwrap();

    assert_eq!(outcome.query, "SELECT n FROM generate_series(1, 1000) AS n LIMIT 500");
    assert_eq!(outcome.rows.as_array().map(Vec::len), Some(500));
    assert_eq!(outcome.rows[0], json!({ "n": 1 }));

    channel.close().await.unwrap();
}

#[tokio::test]
async fn test_cte_and_types() {
    let Some(channel) = get_test_channel().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let validator = QueryValidator::new();
    let executor = QueryExecutor::new(&channel, &validator);

    let outcome = executor
        .execute(
            "WITH t AS (SELECT true AS flag, 2.5::float8 AS ratio, NULL::text AS missing, \
             '{\"a\": 1}'::jsonb AS doc, 12.30::numeric AS amount) SELECT * FROM t;",
        )
        .await
        .into_result()
        .unwrap();

    assert_eq!(
        outcome.rows,
        json!([{
            "flag": true,
            "ratio": 2.5,
            "missing": null,
            "doc": { "a": 1 },
            "amount": "12.30"
        }])
    );

    channel.close().await.unwrap();
}

#[tokio::test]
async fn test_statement_timeout_fires() {
    let Some(channel) = get_test_channel().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let validator = QueryValidator::new();
    let executor = QueryExecutor::new(&channel, &validator);

    match executor.execute("SELECT pg_sleep(11)").await {
        ExecutionResult::Error(GuardError::Query(message)) => {
            assert!(message.contains("statement timeout"), "got: {message}");
        }
        other => panic!("expected a query error, got {other:?}"),
    }

    channel.close().await.unwrap();
}

#[tokio::test]
async fn test_rejected_query_never_reaches_database() {
    let Some(channel) = get_test_channel().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let validator = QueryValidator::new();
    let executor = QueryExecutor::new(&channel, &validator);

    match executor.execute("SELECT 1; DELETE FROM pg_class").await {
        ExecutionResult::Rejected(Rejection::BlockedKeyword(keyword)) => {
            assert_eq!(keyword, "DELETE");
        }
        other => panic!("expected a rejection, got {other:?}"),
    }

    channel.close().await.unwrap();
}
