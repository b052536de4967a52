//!
//! EcoPlanina HTTP server
//! ----------------------
//! Axum front end for the credential-reset function.
//!
//! Responsibilities:
//! - `POST /reset-password` (also mounted at `/functions/v1/reset-password`): bearer
//!   token from `Authorization`, JSON body `{targetUserId, newPassword}`.
//! - CORS preflight for browser callers of the admin console.
//! - `POST /login` issuing bearer tokens when running on the local backend.
//! - Backend selection (local or hosted) from [`ServiceConfig`].

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::FutureExt; // for catch_unwind on async blocks
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::{BackendKind, ServiceConfig};
use crate::error::ResetError;
use crate::hosted::HostedBackend;
use crate::identity::{load_seed, LocalCredentialStore, LocalDirectory, SessionManager};
use crate::reset::{format_result, response, CredentialResetService, Locale, ResetRequest};

const ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";
const ALLOW_METHODS: &str = "POST, OPTIONS";

/// Collaborators behind the local backend, kept for `/login`.
#[derive(Clone)]
pub struct LocalBackend {
    pub sessions: SessionManager,
    pub directory: LocalDirectory,
    pub credentials: LocalCredentialStore,
}

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: CredentialResetService,
    pub locale: Locale,
    pub cors_allow_origin: String,
    /// Present only when running on the local backend.
    pub local: Option<LocalBackend>,
}

impl AppState {
    pub fn local(local: LocalBackend, conf: &ServiceConfig) -> Self {
        let service = CredentialResetService::new(
            Arc::new(local.sessions.clone()),
            Arc::new(local.directory.clone()),
            Arc::new(local.credentials.clone()),
        ).with_min_credential_len(conf.min_credential_len);
        Self { service, locale: conf.locale, cors_allow_origin: conf.cors_allow_origin.clone(), local: Some(local) }
    }

    pub fn hosted(backend: HostedBackend, conf: &ServiceConfig) -> Self {
        let backend = Arc::new(backend);
        let service = CredentialResetService::new(backend.clone(), backend.clone(), backend)
            .with_min_credential_len(conf.min_credential_len);
        Self { service, locale: conf.locale, cors_allow_origin: conf.cors_allow_origin.clone(), local: None }
    }

    pub fn from_config(conf: &ServiceConfig) -> anyhow::Result<Self> {
        match conf.backend {
            BackendKind::Local => {
                let (directory, credentials) = match &conf.seed_file {
                    Some(path) => load_seed(path)?,
                    None => (LocalDirectory::new(), LocalCredentialStore::new()),
                };
                info!(users = directory.len(), "local backend ready");
                let sessions = SessionManager::new(conf.session_ttl());
                Ok(Self::local(LocalBackend { sessions, directory, credentials }, conf))
            }
            BackendKind::Hosted => {
                let hc = conf.hosted_config()?;
                info!(url = %hc.url, timeout_ms = hc.timeout.as_millis() as u64, "hosted backend ready");
                Ok(Self::hosted(HostedBackend::new(&hc)?, conf))
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "ecoplanina ok" }))
        .route("/reset-password", post(reset_password).options(preflight))
        .route("/functions/v1/reset-password", post(reset_password).options(preflight))
        .route("/login", post(login).options(preflight))
        .with_state(state)
}

/// Start the HTTP server with the given configuration and serve until shutdown.
pub async fn run(conf: ServiceConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(&conf)?;
    let addr: SocketAddr = format!("{}:{}", conf.bind_addr, conf.http_port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", conf.bind_addr, conf.http_port))?;
    info!(%addr, backend = ?conf.backend, locale = ?conf.locale, "starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn cors_headers(state: &AppState) -> HeaderMap {
    let mut h = HeaderMap::new();
    let origin = HeaderValue::from_str(&state.cors_allow_origin).unwrap_or(HeaderValue::from_static("*"));
    h.insert("Access-Control-Allow-Origin", origin);
    h.insert("Access-Control-Allow-Headers", HeaderValue::from_static(ALLOW_HEADERS));
    h.insert("Access-Control-Allow-Methods", HeaderValue::from_static(ALLOW_METHODS));
    h
}

/// Extract the token from `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("authorization")?.to_str().ok()?.trim();
    let (scheme, token) = raw.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") { return None; }
    let token = token.trim();
    if token.is_empty() { None } else { Some(token.to_string()) }
}

/// Response language: `x-locale`, then the first `accept-language` tag, then config.
fn request_locale(state: &AppState, headers: &HeaderMap) -> Locale {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    if let Some(l) = header("x-locale").and_then(|v| v.parse::<Locale>().ok()) { return l; }
    header("accept-language")
        .and_then(|v| v.split([',', ';']).next().map(|tag| tag.trim().to_string()))
        .and_then(|tag| tag.parse::<Locale>().ok().or_else(|| tag.split('-').next()?.parse().ok()))
        .unwrap_or(state.locale)
}

async fn preflight(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, cors_headers(&state), "ok")
}

async fn reset_password(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let locale = request_locale(&state, &headers);
    let token = bearer_token(&headers);
    // A malformed body is treated like one with both fields missing.
    let req: ResetRequest = serde_json::from_slice(&body).unwrap_or_default();

    let fut = state.service.reset_credential(token.as_deref(), &req);
    let result = match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(r) => r,
        Err(panic) => {
            let msg = panic.downcast_ref::<&str>().map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(panic = %msg, "reset handler panicked");
            Err(ResetError::Internal("handler panicked".into()))
        }
    };

    // A changed credential ends the target's local sessions.
    if let (Ok(conf), Some(local)) = (&result, state.local.as_ref()) {
        let revoked = local.sessions.revoke_user(&conf.external_ref);
        if revoked > 0 { info!(target_id = %conf.target_id, revoked, "sessions revoked after reset"); }
    }

    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) => StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
    };
    (status, cors_headers(&state), Json(format_result(&result, locale)))
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginResult {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn login(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let locale = request_locale(&state, &headers);
    let cors = cors_headers(&state);
    let denied = || LoginResult { success: false, token: None, error: Some(response::error_message(&ResetError::Unauthenticated, locale)) };

    let Some(local) = state.local.as_ref() else {
        return (StatusCode::NOT_FOUND, cors, Json(LoginResult { success: false, token: None, error: Some("login is served by the hosted backend".into()) }));
    };
    let Ok(payload) = serde_json::from_slice::<LoginPayload>(&body) else {
        return (StatusCode::BAD_REQUEST, cors, Json(LoginResult { success: false, token: None, error: Some(response::error_message(&ResetError::InvalidInput, locale)) }));
    };

    let ext_ref = local.directory.find_active_by_email(&payload.email)
        .and_then(|rec| rec.external_credential_ref().map(str::to_string));
    let Some(ext_ref) = ext_ref else {
        return (StatusCode::UNAUTHORIZED, cors, Json(denied()));
    };
    // argon2 verification is CPU bound
    let creds = local.credentials.clone();
    let ext = ext_ref.clone();
    let verified = tokio::task::spawn_blocking(move || creds.verify(&ext, &payload.password)).await.unwrap_or(false);
    if !verified {
        info!(email = %payload.email, "login rejected");
        return (StatusCode::UNAUTHORIZED, cors, Json(denied()));
    }

    match local.sessions.issue(&ext_ref) {
        Ok(session) => (StatusCode::OK, cors, Json(LoginResult { success: true, token: Some(session.token), error: None })),
        Err(e) => {
            error!(error = %e, "session issue failed");
            let msg = response::error_message(&ResetError::Internal(String::new()), locale);
            (StatusCode::INTERNAL_SERVER_ERROR, cors, Json(LoginResult { success: false, token: None, error: Some(msg) }))
        }
    }
}
