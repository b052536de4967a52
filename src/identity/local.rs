//! In-process directory and credential store used by the local backend and tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use base64::Engine;
use chrono::Utc;
use parking_lot::RwLock;
use password_hash::{PasswordHash, SaltString};
use serde::Deserialize;

use super::principal::UserRecord;
use super::provider::{CredentialStore, UserDirectory};

#[derive(Clone, Default)]
pub struct LocalDirectory {
    users: Arc<RwLock<HashMap<String, UserRecord>>>,
}

impl LocalDirectory {
    pub fn new() -> Self { Self::default() }

    pub fn from_records<I: IntoIterator<Item = UserRecord>>(records: I) -> Self {
        let dir = Self::new();
        for rec in records { dir.upsert(rec); }
        dir
    }

    pub fn upsert(&self, rec: UserRecord) { self.users.write().insert(rec.id.clone(), rec); }

    pub fn soft_delete(&self, id: &str) -> bool {
        match self.users.write().get_mut(id) {
            Some(rec) if rec.is_active() => { rec.deleted_at = Some(Utc::now()); true }
            _ => false,
        }
    }

    pub fn find_active_by_email(&self, email: &str) -> Option<UserRecord> {
        self.users.read().values()
            .find(|r| r.is_active() && r.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email.trim())))
            .cloned()
    }

    pub fn len(&self) -> usize { self.users.read().len() }
    pub fn is_empty(&self) -> bool { self.users.read().is_empty() }
}

#[async_trait::async_trait]
impl UserDirectory for LocalDirectory {
    async fn find_active_by_auth_id(&self, auth_id: &str) -> Result<Option<UserRecord>> {
        let users = self.users.read();
        Ok(users.values().find(|r| r.is_active() && r.external_credential_ref() == Some(auth_id)).cloned())
    }

    async fn find_active_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        Ok(self.users.read().get(id).filter(|r| r.is_active()).cloned())
    }
}

#[derive(Debug, Deserialize)]
struct SeedUser {
    #[serde(flatten)]
    record: UserRecord,
    #[serde(default)]
    password: Option<String>,
}

/// Load a JSON array of user records into a fresh directory and credential store.
///
/// Every record with an `auth_id` gets an external account: with its `password` when
/// the seed gives one, otherwise with a random one nobody knows.
pub fn load_seed(path: &Path) -> Result<(LocalDirectory, LocalCredentialStore)> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading seed file {}", path.display()))?;
    let users: Vec<SeedUser> = serde_json::from_str(&text).with_context(|| format!("parsing seed file {}", path.display()))?;
    let dir = LocalDirectory::new();
    let store = LocalCredentialStore::new();
    for SeedUser { record, password } in users {
        if let Some(ext) = record.external_credential_ref() {
            let pw = match password {
                Some(pw) => pw,
                None => random_password()?,
            };
            store.provision(ext, &pw)?;
        }
        dir.upsert(record);
    }
    Ok((dir, store))
}

fn random_password() -> Result<String> {
    let mut buf = [0u8; 24];
    getrandom::getrandom(&mut buf).map_err(|e| anyhow!(e.to_string()))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let phc = Argon2::default().hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

/// Argon2 hashes keyed by external account reference.
#[derive(Clone, Default)]
pub struct LocalCredentialStore {
    accounts: Arc<RwLock<HashMap<String, String>>>,
}

impl LocalCredentialStore {
    pub fn new() -> Self { Self::default() }

    /// Register an external account with an initial password.
    pub fn provision(&self, external_ref: &str, password: &str) -> Result<()> {
        let phc = hash_password(password)?;
        self.accounts.write().insert(external_ref.to_string(), phc);
        Ok(())
    }

    pub fn contains(&self, external_ref: &str) -> bool { self.accounts.read().contains_key(external_ref) }

    pub fn verify(&self, external_ref: &str, password: &str) -> bool {
        let phc = self.accounts.read().get(external_ref).cloned();
        phc.is_some_and(|h| verify_password(&h, password))
    }
}

#[async_trait::async_trait]
impl CredentialStore for LocalCredentialStore {
    async fn set_credential(&self, external_ref: &str, new_credential: &str) -> Result<()> {
        if !self.contains(external_ref) {
            return Err(anyhow!("user not found: {}", external_ref));
        }
        // argon2 is CPU bound; keep it off the async workers and outside the lock.
        let password = new_credential.to_string();
        let phc = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .context("credential hashing task")??;
        self.accounts.write().insert(external_ref.to_string(), phc);
        Ok(())
    }
}
