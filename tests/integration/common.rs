//! Shared test doubles for the endpoint tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value as JsonValue;
use tower::ServiceExt;

use supaguard::db::SqlChannel;
use supaguard::error::{GuardError, Result};
use supaguard::safety::QueryValidator;
use supaguard::server::{bearer_token, router, AdminGate, AppState, AuditEntry, AuditSink};

pub const ADMIN_TOKEN: &str = "admin-token";
pub const ADMIN_EMAIL: &str = "admin@example.com";

/// Accepts exactly one token, mirroring the Supabase gate's messages.
pub struct StaticAdminGate;

#[async_trait]
impl AdminGate for StaticAdminGate {
    async fn authorize(&self, headers: &HeaderMap) -> Result<String> {
        match bearer_token(headers) {
            None => Err(GuardError::auth("Missing authorization token")),
            Some(ADMIN_TOKEN) => Ok(ADMIN_EMAIL.to_string()),
            Some(_) => Err(GuardError::auth("Access denied: not admin")),
        }
    }
}

/// Keeps every audit entry in memory.
#[derive(Default)]
pub struct RecordingAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingAuditSink {
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<()> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

/// An audit sink whose writes always fail.
pub struct BrokenAuditSink;

#[async_trait]
impl AuditSink for BrokenAuditSink {
    async fn record(&self, _entry: &AuditEntry) -> Result<()> {
        Err(GuardError::connection("audit table unavailable"))
    }
}

pub fn app(channel: Arc<dyn SqlChannel>, audit: Arc<dyn AuditSink>) -> Router {
    router(AppState::new(
        channel,
        QueryValidator::new(),
        Arc::new(StaticAdminGate),
        audit,
    ))
}

/// Builds a `POST /api/sql` request with a raw body.
pub fn sql_request(token: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/sql")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", "203.0.113.7, 10.0.0.1");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Builds an admin request carrying `{"query": sql}`.
pub fn admin_query(sql: &str) -> Request<Body> {
    let body = serde_json::json!({ "query": sql }).to_string();
    sql_request(Some(ADMIN_TOKEN), &body)
}

/// Sends one request and returns the status and JSON body.
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, JsonValue) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| JsonValue::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}
