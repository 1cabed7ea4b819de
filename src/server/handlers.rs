//! Request handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::warn;

use super::audit::AuditEntry;
use super::AppState;
use crate::error::GuardError;
use crate::query::{ExecutionResult, QueryExecutor};

/// Error message for a body without a string `query` field.
pub const QUERY_REQUIRED: &str = "Query string required";

/// JSON error body: `{"error": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn json_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Maps an error to the response status and body shown to the caller.
pub fn error_response(error: &GuardError) -> ApiError {
    let status = match error {
        GuardError::Validation(_) => StatusCode::BAD_REQUEST,
        GuardError::Auth(_) => StatusCode::FORBIDDEN,
        GuardError::Query(_)
        | GuardError::Connection(_)
        | GuardError::Config(_)
        | GuardError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    json_error(status, error.to_string())
}

pub async fn healthz() -> &'static str {
    "ok"
}

/// `POST /api/sql`.
pub async fn execute_sql(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<JsonValue>, JsonRejection>,
) -> Result<Response, ApiError> {
    let admin_email = state
        .gate
        .authorize(&headers)
        .await
        .map_err(|e| error_response(&e))?;

    let query = body
        .ok()
        .and_then(|Json(body)| match body.get("query") {
            Some(JsonValue::String(query)) => Some(query.clone()),
            _ => None,
        })
        .ok_or_else(|| json_error(StatusCode::BAD_REQUEST, QUERY_REQUIRED))?;

    let executor = QueryExecutor::new(state.channel.as_ref(), state.validator.as_ref());
    match executor.execute(&query).await {
        ExecutionResult::Success(outcome) => {
            let entry = AuditEntry::sql(admin_email, query, &headers);
            if let Err(e) = state.audit.record(&entry).await {
                warn!("Audit log error: {}", e);
            }
            Ok(Json(outcome.rows).into_response())
        }
        ExecutionResult::Rejected(rejection) => {
            Err(json_error(StatusCode::BAD_REQUEST, rejection.to_string()))
        }
        ExecutionResult::Error(e) => Err(error_response(&e)),
    }
}
