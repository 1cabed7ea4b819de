//! Audit trail for admin actions.

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::Serialize;
use tracing::info;

use crate::error::Result;

/// Action recorded for SQL console executions.
pub const SQL_ACTION: &str = "SQL";

/// A single admin action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    /// E-mail of the admin who performed the action.
    pub admin_email: String,
    /// Action kind.
    pub action: String,
    /// The SQL text as submitted.
    pub query: String,
    /// Client address, or `unknown`.
    pub ip_address: String,
}

impl AuditEntry {
    /// Builds the entry for a successful SQL execution.
    pub fn sql(admin_email: impl Into<String>, query: impl Into<String>, headers: &HeaderMap) -> Self {
        Self {
            admin_email: admin_email.into(),
            action: SQL_ACTION.to_string(),
            query: query.into(),
            ip_address: client_ip(headers),
        }
    }
}

/// Destination for audit entries.
///
/// Callers log failures and carry on; a failed audit write never fails the
/// request it describes.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persists one entry.
    async fn record(&self, entry: &AuditEntry) -> Result<()>;
}

/// Audit sink that emits entries as structured tracing events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<()> {
        info!(
            target: "supaguard::audit",
            admin_email = %entry.admin_email,
            action = %entry.action,
            ip_address = %entry.ip_address,
            query = %entry.query,
            "admin action"
        );
        Ok(())
    }
}

/// Returns the first `x-forwarded-for` address, or `unknown`.
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or("unknown")
        .to_string()
}
