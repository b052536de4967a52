//! Shared fixtures: a small two-company directory and instrumented collaborators.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;

use ecoplanina::identity::{CredentialStore, LocalDirectory, Role, SessionManager, UserDirectory, UserRecord};
use ecoplanina::reset::CredentialResetService;

pub fn directory() -> LocalDirectory {
    let mut deleted_driver = UserRecord::new("10", Role::Driver).with_auth_id("a-del").with_company("ECO1").with_name("Deleted");
    deleted_driver.deleted_at = Some(chrono::Utc::now());
    let mut deleted_cadmin = UserRecord::new("11", Role::CompanyAdmin).with_auth_id("a-delcadmin").with_company("ECO1");
    deleted_cadmin.deleted_at = Some(chrono::Utc::now());

    LocalDirectory::from_records([
        UserRecord::new("1", Role::Developer).with_auth_id("a-dev").with_name("Dev").with_email("dev@eco.bg"),
        UserRecord::new("2", Role::Admin).with_auth_id("a-admin").with_name("Admin"),
        UserRecord::new("3", Role::CompanyAdmin).with_auth_id("a-cadmin1").with_company("ECO1").with_name("Company Admin 1").with_email("cadmin@eco1.bg"),
        UserRecord::new("4", Role::CompanyAdmin).with_auth_id("a-cadmin1b").with_company("ECO1").with_name("Company Admin 1b"),
        UserRecord::new("5", Role::Manager).with_auth_id("a-mgr1").with_company("ECO1").with_name("Manager 1"),
        UserRecord::new("6", Role::Driver).with_auth_id("a-drv1").with_company("ECO1").with_name("Петър"),
        UserRecord::new("7", Role::Client).with_auth_id("a-cli2").with_company("ECO2").with_name("Client 2"),
        UserRecord::new("8", Role::Driver).with_company("ECO1").with_name("Unprovisioned"),
        UserRecord::new("9", Role::Manager).with_auth_id("a-owner1").with_company("ECO1").with_name("Owner 1").owner(),
        deleted_driver,
        deleted_cadmin,
    ])
}

/// Credential store that keeps plaintext in memory and counts writes.
#[derive(Clone, Default)]
pub struct RecordingStore {
    pub writes: Arc<AtomicUsize>,
    pub values: Arc<Mutex<HashMap<String, String>>>,
    pub fail_with: Option<String>,
}

impl RecordingStore {
    pub fn failing(detail: &str) -> Self { Self { fail_with: Some(detail.to_string()), ..Default::default() } }
    pub fn write_count(&self) -> usize { self.writes.load(Ordering::SeqCst) }
    pub fn value(&self, ext: &str) -> Option<String> { self.values.lock().get(ext).cloned() }
}

#[async_trait::async_trait]
impl CredentialStore for RecordingStore {
    async fn set_credential(&self, external_ref: &str, new_credential: &str) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(detail) = &self.fail_with {
            return Err(anyhow!("{}", detail));
        }
        self.values.lock().insert(external_ref.to_string(), new_credential.to_string());
        Ok(())
    }
}

/// Directory whose lookups always fail, as if the database were down.
pub struct BrokenDirectory;

#[async_trait::async_trait]
impl UserDirectory for BrokenDirectory {
    async fn find_active_by_auth_id(&self, _: &str) -> Result<Option<UserRecord>> { Err(anyhow!("connection refused")) }
    async fn find_active_by_id(&self, _: &str) -> Result<Option<UserRecord>> { Err(anyhow!("connection refused")) }
}

pub struct Harness {
    pub sessions: SessionManager,
    pub directory: LocalDirectory,
    pub store: RecordingStore,
    pub service: CredentialResetService,
}

impl Harness {
    pub fn new() -> Self { Self::with_store(RecordingStore::default()) }

    pub fn with_store(store: RecordingStore) -> Self {
        let sessions = SessionManager::default();
        let directory = directory();
        let service = CredentialResetService::new(Arc::new(sessions.clone()), Arc::new(directory.clone()), Arc::new(store.clone()));
        Self { sessions, directory, store, service }
    }

    /// Bearer token for the given external auth id.
    pub fn token(&self, auth_id: &str) -> String { self.sessions.issue(auth_id).unwrap().token }
}
