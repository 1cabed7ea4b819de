//! HTTP surface for supaguard.
//!
//! Exposes the guarded SQL endpoint behind the admin gate and records an
//! audit entry for every successful execution.

pub mod audit;
pub mod auth;
mod handlers;

pub use audit::{client_ip, AuditEntry, AuditSink, TracingAuditSink};
pub use auth::{bearer_token, AdminGate, SupabaseAdminGate};
pub use handlers::{ErrorResponse, QUERY_REQUIRED};

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tracing::info;

use crate::config::Config;
use crate::db::SqlChannel;
use crate::error::{GuardError, Result};
use crate::safety::QueryValidator;

/// Shared, read-only request state.
#[derive(Clone)]
pub struct AppState {
    channel: Arc<dyn SqlChannel>,
    validator: Arc<QueryValidator>,
    gate: Arc<dyn AdminGate>,
    audit: Arc<dyn AuditSink>,
}

impl AppState {
    pub fn new(
        channel: Arc<dyn SqlChannel>,
        validator: QueryValidator,
        gate: Arc<dyn AdminGate>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            channel,
            validator: Arc::new(validator),
            gate,
            audit,
        }
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/api/sql", post(handlers::execute_sql))
        .with_state(state)
}

/// Serves the endpoint until Ctrl-C, then closes the channel.
pub async fn serve(config: &Config, channel: Arc<dyn SqlChannel>) -> Result<()> {
    let gate = SupabaseAdminGate::from_config(config)?;
    let validator =
        QueryValidator::new().with_extra_keywords(&config.guard.extra_blocked_keywords);
    let state = AppState::new(
        Arc::clone(&channel),
        validator,
        Arc::new(gate),
        Arc::new(TracingAuditSink),
    );

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .map_err(|e| {
            GuardError::config(format!("Failed to bind {}: {e}", config.server.bind))
        })?;
    let addr = listener
        .local_addr()
        .map_err(|e| GuardError::internal(e.to_string()))?;
    info!("Listening on http://{} (channel: {})", addr, channel.name());

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| GuardError::internal(format!("Server error: {e}")))?;

    info!("Shutting down");
    channel.close().await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
