//! HTTP surface over the local backend: status codes, JSON bodies, CORS and login.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{json, Value};

use ecoplanina::config::ServiceConfig;
use ecoplanina::identity::{CredentialStore, LocalCredentialStore, SessionManager};
use ecoplanina::reset::{CredentialResetService, Locale};
use ecoplanina::server::{router, AppState, LocalBackend};

async fn serve(state: AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let app = router(state);
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{}", addr)
}

struct TestServer {
    base: String,
    sessions: SessionManager,
    credentials: LocalCredentialStore,
    client: reqwest::Client,
}

impl TestServer {
    async fn start(conf: ServiceConfig) -> Self {
        let sessions = SessionManager::default();
        let credentials = LocalCredentialStore::new();
        credentials.provision("a-cadmin1", "cadmin-pass").unwrap();
        credentials.provision("a-drv1", "driver-pass").unwrap();
        let local = LocalBackend { sessions: sessions.clone(), directory: common::directory(), credentials: credentials.clone() };
        let base = serve(AppState::local(local, &conf)).await;
        Self { base, sessions, credentials, client: reqwest::Client::new() }
    }

    async fn reset(&self, token: Option<&str>, body: Value, locale: Option<&str>) -> (u16, Value) {
        let mut req = self.client.post(format!("{}/reset-password", self.base)).json(&body);
        if let Some(t) = token { req = req.bearer_auth(t); }
        if let Some(l) = locale { req = req.header("accept-language", l); }
        let resp = req.send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }
}

#[tokio::test]
async fn health_endpoint_answers() {
    let srv = TestServer::start(ServiceConfig::default()).await;
    let body = reqwest::get(format!("{}/", srv.base)).await.unwrap().text().await.unwrap();
    assert_eq!(body, "ecoplanina ok");
}

#[tokio::test]
async fn successful_reset_returns_localized_message() {
    let srv = TestServer::start(ServiceConfig::default()).await;
    let token = srv.sessions.issue("a-cadmin1").unwrap().token;
    let (status, body) = srv.reset(Some(token.as_str()), json!({"targetUserId": "6", "newPassword": "brand-new"}), None).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"success": true, "message": "Паролата на Петър е сменена успешно"}));
    assert!(srv.credentials.verify("a-drv1", "brand-new"));

    let (status, body) = srv.reset(Some(token.as_str()), json!({"targetUserId": 6, "newPassword": "newer-one"}), Some("en-US,en;q=0.9")).await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "Password for Петър was changed successfully");
}

#[tokio::test]
async fn failures_map_to_status_codes() {
    let srv = TestServer::start(ServiceConfig::default()).await;
    let cadmin = srv.sessions.issue("a-cadmin1").unwrap().token;
    let ghost = srv.sessions.issue("a-nobody").unwrap().token;

    let cases: Vec<(Option<&str>, Value, u16)> = vec![
        (None, json!({"targetUserId": "6", "newPassword": "secret1"}), 401),
        (Some("forged"), json!({"targetUserId": "6", "newPassword": "secret1"}), 401),
        (Some(ghost.as_str()), json!({"targetUserId": "6", "newPassword": "secret1"}), 404),
        (Some(cadmin.as_str()), json!({"targetUserId": "6"}), 400),
        (Some(cadmin.as_str()), json!({"targetUserId": "6", "newPassword": "123"}), 400),
        (Some(cadmin.as_str()), json!({"targetUserId": "999", "newPassword": "secret1"}), 404),
        (Some(cadmin.as_str()), json!({"targetUserId": "7", "newPassword": "secret1"}), 403),
        (Some(cadmin.as_str()), json!({"targetUserId": "4", "newPassword": "secret1"}), 403),
        (Some(cadmin.as_str()), json!({"targetUserId": "8", "newPassword": "secret1"}), 409),
        // Manager 1 has an auth id but no account in the credential store.
        (Some(cadmin.as_str()), json!({"targetUserId": "5", "newPassword": "secret1"}), 502),
    ];
    for (token, body, expected) in cases {
        let (status, out) = srv.reset(token, body.clone(), Some("en")).await;
        assert_eq!(status, expected, "{} -> {}", body, out);
        assert_eq!(out["success"], false);
        assert!(out["error"].as_str().is_some_and(|e| !e.is_empty()), "{}", out);
        assert!(out.get("message").is_none());
    }
}

#[tokio::test]
async fn error_texts_follow_locale() {
    let srv = TestServer::start(ServiceConfig::default()).await;
    let cadmin = srv.sessions.issue("a-cadmin1").unwrap().token;
    let body = json!({"targetUserId": "7", "newPassword": "secret1"});

    let (_, bg) = srv.reset(Some(cadmin.as_str()), body.clone(), None).await;
    assert_eq!(bg["error"], "Нямате право да сменяте пароли на потребители от друга фирма");
    let (_, en) = srv.reset(Some(cadmin.as_str()), body, Some("en")).await;
    assert_eq!(en["error"], "You cannot reset passwords of users from another company");

    let (_, weak) = srv.reset(Some(cadmin.as_str()), json!({"targetUserId": "6", "newPassword": "abc"}), Some("en")).await;
    assert_eq!(weak["error"], "Password must be at least 6 characters");
}

#[tokio::test]
async fn malformed_body_is_invalid_input() {
    let srv = TestServer::start(ServiceConfig::default()).await;
    let token = srv.sessions.issue("a-cadmin1").unwrap().token;
    let resp = srv.client
        .post(format!("{}/functions/v1/reset-password", srv.base))
        .bearer_auth(&token)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let out: Value = resp.json().await.unwrap();
    assert_eq!(out["error"], "Липсват задължителни полета: targetUserId и newPassword");
}

#[tokio::test]
async fn preflight_and_responses_carry_cors_headers() {
    let mut conf = ServiceConfig::default();
    conf.cors_allow_origin = "https://admin.ecoplanina.bg".into();
    let srv = TestServer::start(conf).await;

    let resp = srv.client
        .request(reqwest::Method::OPTIONS, format!("{}/reset-password", srv.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let h = resp.headers();
    assert_eq!(h["access-control-allow-origin"], "https://admin.ecoplanina.bg");
    assert!(h["access-control-allow-headers"].to_str().unwrap().contains("authorization"));
    assert!(h["access-control-allow-methods"].to_str().unwrap().contains("POST"));

    let resp = srv.client.post(format!("{}/reset-password", srv.base)).json(&json!({})).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 401);
    assert_eq!(resp.headers()["access-control-allow-origin"], "https://admin.ecoplanina.bg");
}

#[tokio::test]
async fn login_then_reset() {
    let srv = TestServer::start(ServiceConfig::default()).await;
    let login = |email: &str, password: &str| {
        srv.client
            .post(format!("{}/login", srv.base))
            .json(&json!({"email": email, "password": password}))
            .send()
    };

    let resp = login("cadmin@eco1.bg", "wrong").await.unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    let resp = login("CADMIN@eco1.bg", "cadmin-pass").await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let out: Value = resp.json().await.unwrap();
    assert_eq!(out["success"], true);
    let token = out["token"].as_str().unwrap().to_string();

    let (status, _) = srv.reset(Some(token.as_str()), json!({"targetUserId": "6", "newPassword": "via-login"}), None).await;
    assert_eq!(status, 200);
    assert!(srv.credentials.verify("a-drv1", "via-login"));

    let resp = login("nobody@eco1.bg", "via-login").await.unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn reset_ends_target_sessions() {
    let srv = TestServer::start(ServiceConfig::default()).await;
    let cadmin = srv.sessions.issue("a-cadmin1").unwrap().token;
    let driver = srv.sessions.issue("a-drv1").unwrap().token;
    assert_eq!(srv.sessions.len(), 2);

    let (status, _) = srv.reset(Some(cadmin.as_str()), json!({"targetUserId": "6", "newPassword": "rotated-pw"}), None).await;
    assert_eq!(status, 200);
    assert_eq!(srv.sessions.validate(&driver), None);
    assert_eq!(srv.sessions.validate(&cadmin).as_deref(), Some("a-cadmin1"));

    // The old driver token no longer authenticates.
    let (status, _) = srv.reset(Some(driver.as_str()), json!({"targetUserId": "6", "newPassword": "rotated-pw"}), None).await;
    assert_eq!(status, 401);
}

struct PanickingStore;

#[async_trait::async_trait]
impl CredentialStore for PanickingStore {
    async fn set_credential(&self, _: &str, _: &str) -> anyhow::Result<()> {
        panic!("credential store exploded")
    }
}

#[tokio::test]
async fn handler_panic_becomes_internal_error() {
    let sessions = SessionManager::default();
    let service = CredentialResetService::new(Arc::new(sessions.clone()), Arc::new(common::directory()), Arc::new(PanickingStore));
    let state = AppState { service, locale: Locale::En, cors_allow_origin: "*".into(), local: None };
    let base = serve(state).await;
    let token = sessions.issue("a-cadmin1").unwrap().token;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/reset-password", base))
        .bearer_auth(&token)
        .json(&json!({"targetUserId": "6", "newPassword": "secret1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 500);
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    let out: Value = resp.json().await.unwrap();
    assert_eq!(out, json!({"success": false, "error": "Internal server error"}));

    // The server keeps serving after the panic.
    let resp = client
        .post(format!("{}/reset-password", base))
        .bearer_auth(&token)
        .json(&json!({"targetUserId": "7", "newPassword": "secret1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}
