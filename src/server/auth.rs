//! Admin gate.
//!
//! Only one identity may use the SQL endpoint: the bearer token must belong
//! to the Supabase user whose e-mail matches the configured admin e-mail.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::error::{GuardError, Result};

/// Timeout for the token lookup.
const AUTH_TIMEOUT_SECS: u64 = 5;

/// Decides whether a request comes from the admin.
#[async_trait]
pub trait AdminGate: Send + Sync {
    /// Returns the admin e-mail on success, or an `Auth` error whose message
    /// is safe to show to the caller.
    async fn authorize(&self, headers: &HeaderMap) -> Result<String>;
}

/// Admin gate backed by the Supabase auth API.
#[derive(Debug, Clone)]
pub struct SupabaseAdminGate {
    client: Client,
    user_endpoint: Url,
    api_key: String,
    admin_email: String,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    email: Option<String>,
}

impl SupabaseAdminGate {
    /// Creates a gate for the project at `base_url`.
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        admin_email: impl Into<String>,
    ) -> Result<Self> {
        let mut base = Url::parse(base_url)
            .map_err(|e| GuardError::config(format!("Invalid Supabase URL: {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let user_endpoint = base
            .join("auth/v1/user")
            .map_err(|e| GuardError::config(format!("Invalid Supabase URL: {e}")))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(AUTH_TIMEOUT_SECS))
            .build()
            .map_err(|e| GuardError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            user_endpoint,
            api_key: api_key.into(),
            admin_email: admin_email.into(),
        })
    }

    /// Creates a gate from the `[supabase]` and `[admin]` config sections.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.supabase.require_url()?,
            config.supabase.require_service_role_key()?,
            config.admin.require_email()?,
        )
    }

    /// Returns the user lookup endpoint.
    pub fn user_endpoint(&self) -> &Url {
        &self.user_endpoint
    }

    async fn lookup_email(&self, token: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(self.user_endpoint.clone())
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| GuardError::connection(format!("Auth service unreachable: {e}")))?;

        if !response.status().is_success() {
            debug!("Token rejected by auth service: {}", response.status());
            return Err(GuardError::auth("Invalid token"));
        }

        let user: AuthUser = response
            .json()
            .await
            .map_err(|_| GuardError::auth("Invalid token"))?;
        Ok(user.email)
    }
}

#[async_trait]
impl AdminGate for SupabaseAdminGate {
    async fn authorize(&self, headers: &HeaderMap) -> Result<String> {
        let token =
            bearer_token(headers).ok_or_else(|| GuardError::auth("Missing authorization token"))?;

        match self.lookup_email(token).await? {
            Some(email) if email == self.admin_email => Ok(email),
            _ => Err(GuardError::auth("Access denied: not admin")),
        }
    }
}

/// Extracts the bearer token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
