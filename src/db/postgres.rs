//! Direct PostgreSQL channel.
//!
//! Provides the `PostgresChannel` struct that implements the `SqlChannel`
//! trait over a sqlx connection pool. Envelopes contain several statements,
//! so they are sent with the simple query protocol.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions, PgRow};
use sqlx::{Column as SqlxColumn, Executor, Row as SqlxRow, TypeInfo};
use tracing::{debug, warn};
use url::Url;

use super::SqlChannel;
use crate::error::{GuardError, Result};
use crate::query::ExecutionEnvelope;

/// Maximum number of connection retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// PostgreSQL execution channel.
#[derive(Debug)]
pub struct PostgresChannel {
    pool: PgPool,
}

impl PostgresChannel {
    /// Creates a new channel from an existing connection pool.
    ///
    /// This is primarily useful for testing.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database at `url`, retrying transient failures.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let mut last_error = None;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            debug!("Connection attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

            let result = PgPoolOptions::new()
                .max_connections(max_connections)
                .acquire_timeout(Duration::from_secs(10))
                .connect(url)
                .await;

            match result {
                Ok(pool) => {
                    debug!("Successfully connected to database");
                    return Ok(Self { pool });
                }
                Err(e) => {
                    let is_transient = is_transient_error(&e);
                    last_error = Some(e);

                    if !is_transient {
                        break;
                    }
                    if attempt < MAX_RETRY_ATTEMPTS {
                        warn!(
                            "Connection attempt {} failed (transient error), retrying in {:?}",
                            attempt, delay
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2; // Exponential backoff
                    }
                }
            }
        }

        Err(match last_error {
            Some(e) => map_connection_error(e, url),
            None => GuardError::internal("No connection attempt was made"),
        })
    }
}

#[async_trait]
impl SqlChannel for PostgresChannel {
    async fn execute(&self, envelope: &ExecutionEnvelope) -> Result<JsonValue> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| GuardError::connection(format!("Failed to acquire connection: {e}")))?;

        let rows = run_envelope(&mut conn, envelope.as_str())
            .await
            .map_err(|e| GuardError::query(format_query_error(e)))?;

        Ok(JsonValue::Array(rows.iter().map(row_to_json).collect()))
    }

    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Runs envelope text on one connection and returns its rows.
///
/// Afterwards the connection is returned to a clean state: a failed envelope
/// leaves its read-only transaction open, and a committed one may have
/// changed session settings through `set_config`, including ones that
/// affect how the next query is tokenized.
async fn run_envelope(
    conn: &mut PgConnection,
    sql: &str,
) -> std::result::Result<Vec<PgRow>, sqlx::Error> {
    let result = Executor::fetch_all(&mut *conn, sqlx::raw_sql(sql)).await;

    if result.is_err() {
        if let Err(e) = Executor::execute(&mut *conn, sqlx::raw_sql("ROLLBACK")).await {
            warn!("Rollback after failed query also failed: {}", e);
        }
    }
    if let Err(e) = Executor::execute(&mut *conn, sqlx::raw_sql("RESET ALL")).await {
        warn!("Failed to reset session settings: {}", e);
    }

    result
}

/// Converts a sqlx PgRow to a JSON object keyed by column name.
fn row_to_json(row: &PgRow) -> JsonValue {
    let object: Map<String, JsonValue> = row
        .columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            (
                col.name().to_string(),
                convert_value(row, i, col.type_info().name()),
            )
        })
        .collect();
    JsonValue::Object(object)
}

/// Converts a single column value from a PgRow to JSON.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> JsonValue {
    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(JsonValue::Bool)
            .unwrap_or(JsonValue::Null),

        "INT2" | "SMALLINT" => row
            .try_get::<Option<i16>, _>(index)
            .ok()
            .flatten()
            .map(JsonValue::from)
            .unwrap_or(JsonValue::Null),

        "INT4" | "INT" | "INTEGER" => row
            .try_get::<Option<i32>, _>(index)
            .ok()
            .flatten()
            .map(JsonValue::from)
            .unwrap_or(JsonValue::Null),

        "INT8" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(JsonValue::from)
            .unwrap_or(JsonValue::Null),

        "FLOAT4" | "REAL" => row
            .try_get::<Option<f32>, _>(index)
            .ok()
            .flatten()
            .map(|v| JsonValue::from(v as f64))
            .unwrap_or(JsonValue::Null),

        "FLOAT8" | "DOUBLE PRECISION" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(JsonValue::from)
            .unwrap_or(JsonValue::Null),

        "JSON" | "JSONB" => row
            .try_get::<Option<JsonValue>, _>(index)
            .ok()
            .flatten()
            .unwrap_or(JsonValue::Null),

        // Simple-query rows arrive in text format, so every other type
        // decodes as its textual representation
        _ => row
            .try_get_unchecked::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(JsonValue::String)
            .unwrap_or(JsonValue::Null),
    }
}

/// Determines if an error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    // Authentication and database-not-found errors are never transient
    if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
        || error_str.contains("does not exist")
    {
        return false;
    }

    error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("timeout")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, url: &str) -> GuardError {
    let parsed = Url::parse(url).ok();
    let host = parsed
        .as_ref()
        .and_then(|u| u.host_str().map(String::from))
        .unwrap_or_else(|| "localhost".to_string());
    let port = parsed.as_ref().and_then(|u| u.port()).unwrap_or(5432);
    let user = parsed
        .as_ref()
        .map(|u| u.username().to_string())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        GuardError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        GuardError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        GuardError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        GuardError::connection(error.to_string())
    }
}

/// Returns the database's own message for an execution error.
fn format_query_error(error: sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => db_error.message().to_string(),
        None => error.to_string(),
    }
}
