//!
//! Hosted backend adapter
//! ----------------------
//! Implements the identity verifier, user directory and credential store contracts
//! against the hosted backend-as-a-service over HTTP:
//!
//! - `GET  /auth/v1/user` verifies a user's bearer token.
//! - `GET  /rest/v1/<table>` reads directory rows (active rows only).
//! - `PUT  /auth/v1/admin/users/<id>` sets a password with the service key.
//!
//! Timeouts are applied per request by the underlying client and surface as errors.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::identity::{CredentialStore, IdentityVerifier, UserDirectory, UserRecord, VerifiedIdentity};

#[derive(Debug, Clone)]
pub struct HostedConfig {
    pub url: String,
    pub service_key: String,
    pub timeout: Duration,
    pub users_table: String,
}

impl HostedConfig {
    pub fn new<S1: Into<String>, S2: Into<String>>(url: S1, service_key: S2) -> Self {
        Self { url: url.into(), service_key: service_key.into(), timeout: Duration::from_secs(10), users_table: "users".into() }
    }
}

#[derive(Clone)]
pub struct HostedBackend {
    client: reqwest::Client,
    base: String,
    service_key: String,
    users_table: String,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
}

impl HostedBackend {
    pub fn new(conf: &HostedConfig) -> Result<Self> {
        if conf.url.trim().is_empty() { return Err(anyhow!("hosted backend url is empty")); }
        if conf.service_key.trim().is_empty() { return Err(anyhow!("hosted backend service key is empty")); }
        let client = reqwest::Client::builder()
            .timeout(conf.timeout)
            .build()
            .context("building hosted backend http client")?;
        Ok(Self {
            client,
            base: conf.url.trim_end_matches('/').to_string(),
            service_key: conf.service_key.clone(),
            users_table: conf.users_table.clone(),
        })
    }

    fn service_get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.base, path))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<UserRecord>> {
        let resp = self
            .service_get(&format!("/rest/v1/{}", self.users_table))
            .query(&[
                ("select", "*".to_string()),
                (column, format!("eq.{}", value)),
                ("deleted_at", "is.null".to_string()),
                ("limit", "1".to_string()),
            ])
            .send()
            .await
            .with_context(|| format!("directory lookup by {}", column))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            // A rejected filter value (e.g. a non-numeric id) matches no row.
            if status.is_client_error() && status != StatusCode::UNAUTHORIZED && status != StatusCode::FORBIDDEN {
                tracing::warn!(%status, column, detail = %error_detail(&body), "directory rejected lookup");
                return Ok(None);
            }
            return Err(anyhow!("directory returned {}: {}", status, error_detail(&body)));
        }
        let rows: Vec<UserRecord> = resp.json().await.context("decoding directory rows")?;
        Ok(rows.into_iter().find(UserRecord::is_active))
    }
}

/// Pull a human-readable message out of an error body.
fn error_detail(body: &str) -> String {
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["msg", "message", "error_description", "error"] {
            if let Some(s) = v.get(key).and_then(|m| m.as_str()) { return s.to_string(); }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() { "no details".to_string() } else { trimmed.to_string() }
}

#[async_trait::async_trait]
impl IdentityVerifier for HostedBackend {
    async fn verify(&self, token: &str) -> Result<Option<VerifiedIdentity>> {
        let resp = self.client
            .get(format!("{}/auth/v1/user", self.base))
            .header("apikey", &self.service_key)
            .bearer_auth(token)
            .send()
            .await
            .context("identity verification request")?;
        match resp.status() {
            StatusCode::OK => {
                let user: AuthUser = resp.json().await.context("decoding auth user")?;
                Ok(Some(VerifiedIdentity { user_id: user.id }))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            other => Err(anyhow!("identity service returned {}", other)),
        }
    }
}

#[async_trait::async_trait]
impl UserDirectory for HostedBackend {
    async fn find_active_by_auth_id(&self, auth_id: &str) -> Result<Option<UserRecord>> {
        self.find_one("auth_id", auth_id).await
    }

    async fn find_active_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        self.find_one("id", id).await
    }
}

#[async_trait::async_trait]
impl CredentialStore for HostedBackend {
    async fn set_credential(&self, external_ref: &str, new_credential: &str) -> Result<()> {
        let url = format!("{}/auth/v1/admin/users/{}", self.base, urlencoding::encode(external_ref));
        let resp = self.client
            .put(url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .json(&serde_json::json!({ "password": new_credential }))
            .send()
            .await
            .context("credential update request")?;
        let status = resp.status();
        if status.is_success() { return Ok(()); }
        let body = resp.text().await.unwrap_or_default();
        Err(anyhow!("{}", error_detail(&body))).with_context(|| format!("credential store returned {}", status))
    }
}
