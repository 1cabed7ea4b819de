//! Execution channel abstraction for supaguard.
//!
//! Provides a trait-based interface for the single entry point that runs a
//! complete SQL envelope, allowing different backends to be used
//! interchangeably.

mod mock;
mod postgres;
mod rpc;

pub use mock::{FailingChannel, MockChannel};
pub use postgres::PostgresChannel;
pub use rpc::RpcChannel;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::config::Config;
use crate::error::{GuardError, Result};
use crate::query::ExecutionEnvelope;

/// Supported execution channel backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelBackend {
    /// Supabase `exec_sql` RPC over PostgREST.
    #[default]
    Rpc,
    /// Direct PostgreSQL connection.
    Postgres,
    /// In-memory channel returning canned rows.
    Mock,
}

impl ChannelBackend {
    /// Returns the backend as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rpc => "rpc",
            Self::Postgres => "postgres",
            Self::Mock => "mock",
        }
    }
}

impl std::str::FromStr for ChannelBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rpc" | "supabase" => Ok(Self::Rpc),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mock" => Ok(Self::Mock),
            _ => Err(format!(
                "Invalid channel: {s}. Expected: rpc, postgres, or mock"
            )),
        }
    }
}

impl std::fmt::Display for ChannelBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Creates the execution channel for the given backend and configuration.
///
/// This is the central factory function for channels.
pub async fn connect(backend: ChannelBackend, config: &Config) -> Result<Arc<dyn SqlChannel>> {
    match backend {
        ChannelBackend::Rpc => {
            let channel = RpcChannel::from_config(&config.supabase)?;
            Ok(Arc::new(channel))
        }
        ChannelBackend::Postgres => {
            let url = config
                .database
                .url
                .as_deref()
                .ok_or_else(|| GuardError::config("database.url (or DATABASE_URL) is required"))?;
            let channel = PostgresChannel::connect(url, config.database.max_connections).await?;
            Ok(Arc::new(channel))
        }
        ChannelBackend::Mock => Ok(Arc::new(MockChannel::unrecorded())),
    }
}

/// Trait defining the single execution entry point.
///
/// Implementations run the envelope as-is and return the raw result set, or
/// the database's error message unchanged.
#[async_trait]
pub trait SqlChannel: Send + Sync {
    /// Executes a complete envelope and returns the raw result set.
    async fn execute(&self, envelope: &ExecutionEnvelope) -> Result<JsonValue>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Releases any held connections.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
