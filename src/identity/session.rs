use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use base64::Engine;
use parking_lot::RwLock;

use super::provider::{IdentityVerifier, VerifiedIdentity};

pub type SessionToken = String;

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub token: SessionToken,
    /// External auth account id the session was issued for.
    pub user_id: String,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

#[derive(Default)]
struct SessionTables {
    sessions: HashMap<SessionToken, Session>,
    by_user: HashMap<String, HashSet<SessionToken>>,
}

impl SessionTables {
    fn remove(&mut self, token: &str) -> Option<Session> {
        let sess = self.sessions.remove(token)?;
        if let Some(set) = self.by_user.get_mut(&sess.user_id) {
            set.remove(token);
            if set.is_empty() { self.by_user.remove(&sess.user_id); }
        }
        Some(sess)
    }

    /// Drop every session that expired at or before `now`.
    fn sweep(&mut self, now: Instant) -> usize {
        let expired: Vec<SessionToken> = self.sessions.iter()
            .filter(|(_, s)| s.expires_at <= now)
            .map(|(tok, _)| tok.clone())
            .collect();
        for tok in &expired { self.remove(tok); }
        expired.len()
    }
}

fn gen_id() -> Result<String> {
    // 256-bit random token, base64url without padding
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).map_err(|e| anyhow!("session token entropy: {}", e))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

/// In-process bearer tokens for the local backend.
#[derive(Clone)]
pub struct SessionManager {
    pub ttl: Duration,
    tables: Arc<RwLock<SessionTables>>,
}

impl Default for SessionManager {
    fn default() -> Self { Self::new(Duration::from_secs(60 * 60)) }
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self { Self { ttl, tables: Arc::new(RwLock::new(SessionTables::default())) } }

    /// Issue a new session. Expired sessions of every user are swept first.
    pub fn issue(&self, user_id: &str) -> Result<Session> {
        let now = Instant::now();
        let sess = Session {
            session_id: gen_id()?,
            token: gen_id()?,
            user_id: user_id.to_string(),
            issued_at: now,
            expires_at: now + self.ttl,
        };
        let mut t = self.tables.write();
        let swept = t.sweep(now);
        t.sessions.insert(sess.token.clone(), sess.clone());
        t.by_user.entry(sess.user_id.clone()).or_default().insert(sess.token.clone());
        tracing::debug!(user = %sess.user_id, sid = %sess.session_id, ttl_secs = self.ttl.as_secs(), swept, "session.issue");
        Ok(sess)
    }

    /// Returns the user id behind a live token; expired entries are dropped on sight.
    pub fn validate(&self, token: &str) -> Option<String> {
        let now = Instant::now();
        let expired = {
            let t = self.tables.read();
            match t.sessions.get(token) {
                Some(s) if s.expires_at > now => return Some(s.user_id.clone()),
                Some(_) => true,
                None => false,
            }
        };
        if expired { self.logout(token); }
        None
    }

    pub fn logout(&self, token: &str) -> bool { self.tables.write().remove(token).is_some() }

    /// Number of live (not yet swept) sessions.
    pub fn len(&self) -> usize { self.tables.read().sessions.len() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// End every session of `user_id`; used after that user's credential changes.
    pub fn revoke_user(&self, user_id: &str) -> usize {
        let mut t = self.tables.write();
        let tokens = t.by_user.remove(user_id).unwrap_or_default();
        let count = tokens.iter().filter(|tok| t.sessions.remove(*tok).is_some()).count();
        tracing::debug!(user = %user_id, count, "session.revoke");
        count
    }
}

#[async_trait::async_trait]
impl IdentityVerifier for SessionManager {
    async fn verify(&self, token: &str) -> anyhow::Result<Option<VerifiedIdentity>> {
        Ok(self.validate(token).map(|user_id| VerifiedIdentity { user_id }))
    }
}
