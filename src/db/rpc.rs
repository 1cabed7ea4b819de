//! Supabase RPC channel.
//!
//! Sends envelopes to the `exec_sql` database function through the
//! PostgREST RPC endpoint using the service-role key.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;
use url::Url;

use super::SqlChannel;
use crate::config::SupabaseConfig;
use crate::error::{GuardError, Result};
use crate::query::{ExecutionEnvelope, STATEMENT_TIMEOUT_SECS};

/// Client-side request timeout. Kept above the statement timeout so the
/// database's own cancellation error is what callers see.
const REQUEST_TIMEOUT_SECS: u64 = STATEMENT_TIMEOUT_SECS + 5;

/// Channel backed by a Supabase RPC function.
#[derive(Debug, Clone)]
pub struct RpcChannel {
    client: Client,
    endpoint: Url,
    service_key: String,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    query_text: &'a str,
}

/// Error body returned by PostgREST.
#[derive(Debug, Deserialize)]
struct PostgrestError {
    message: String,
}

impl RpcChannel {
    /// Creates a channel calling `function` on the project at `base_url`.
    pub fn new(base_url: &str, service_key: impl Into<String>, function: &str) -> Result<Self> {
        let endpoint = rpc_endpoint(base_url, function)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| GuardError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            service_key: service_key.into(),
        })
    }

    /// Creates a channel from the `[supabase]` config section.
    pub fn from_config(config: &SupabaseConfig) -> Result<Self> {
        let url = config.require_url()?;
        let key = config.require_service_role_key()?;
        Self::new(url, key, &config.rpc_function)
    }

    /// Returns the RPC endpoint URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl SqlChannel for RpcChannel {
    async fn execute(&self, envelope: &ExecutionEnvelope) -> Result<JsonValue> {
        debug!("POST {}", self.endpoint);

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .json(&RpcRequest {
                query_text: envelope.as_str(),
            })
            .send()
            .await
            .map_err(|e| map_request_error(&self.endpoint, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GuardError::connection(format!("Failed to read RPC response: {e}")))?;

        if !status.is_success() {
            return Err(parse_error(status, &body));
        }

        if body.trim().is_empty() {
            return Ok(JsonValue::Null);
        }

        serde_json::from_str(&body)
            .map_err(|e| GuardError::internal(format!("RPC returned invalid JSON: {e}")))
    }

    fn name(&self) -> &'static str {
        "rpc"
    }
}

/// Builds `<base>/rest/v1/rpc/<function>`.
fn rpc_endpoint(base_url: &str, function: &str) -> Result<Url> {
    if !is_valid_function_name(function) {
        return Err(GuardError::config(format!(
            "Invalid RPC function name '{function}'"
        )));
    }

    let mut base = Url::parse(base_url)
        .map_err(|e| GuardError::config(format!("Invalid Supabase URL: {e}")))?;

    if base.scheme() != "https" && base.scheme() != "http" {
        return Err(GuardError::config(format!(
            "Invalid scheme '{}'. Expected 'https' or 'http'",
            base.scheme()
        )));
    }

    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    base.join(&format!("rest/v1/rpc/{function}"))
        .map_err(|e| GuardError::config(format!("Invalid Supabase URL: {e}")))
}

fn is_valid_function_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Extracts the database error message from a failed RPC response.
fn parse_error(status: StatusCode, body: &str) -> GuardError {
    if let Ok(error) = serde_json::from_str::<PostgrestError>(body) {
        return GuardError::query(error.message);
    }

    if body.trim().is_empty() {
        GuardError::query(format!("RPC failed with status {status}"))
    } else {
        GuardError::query(format!("RPC failed ({status}): {body}"))
    }
}

fn map_request_error(endpoint: &Url, error: reqwest::Error) -> GuardError {
    let host = endpoint.host_str().unwrap_or("unknown host");
    if error.is_timeout() {
        GuardError::connection(format!("Request to {host} timed out"))
    } else if error.is_connect() {
        GuardError::connection(format!("Cannot connect to {host}"))
    } else {
        GuardError::connection(error.to_string())
    }
}
