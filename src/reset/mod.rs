//! Delegated credential reset.
//!
//! [`CredentialResetService::reset_credential`] authenticates the requester, resolves
//! both directory records, applies [`decide`] and only then writes the new credential
//! through the [`CredentialStore`]. Steps run strictly in order and the first failure
//! wins, so the credential store is never called for a request that failed earlier.
//!
//! The service holds no per-request state. Concurrent resets of the same user are not
//! serialized here: each one that passes the checks is written and the store keeps the
//! last write.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::Instrument;

use crate::error::{ResetError, ResetResult};
use crate::identity::{
    decide, Actor, CredentialStore, Decision, IdentityVerifier, Target, UserDirectory,
};

pub mod audit;
pub mod response;

pub use audit::{AuditDecision, AuditEvent};
pub use response::{format_result, Locale, ResetOutcome};

/// Minimum length of a new credential, in UTF-16 code units.
pub const MIN_CREDENTIAL_LEN: usize = 6;

/// Request body: `{ "targetUserId": ..., "newPassword": ... }`.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetRequest {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub target_user_id: Option<String>,
    #[serde(default)]
    pub new_password: Option<String>,
}

impl ResetRequest {
    pub fn new<S1: Into<String>, S2: Into<String>>(target_user_id: S1, new_password: S2) -> Self {
        Self { target_user_id: Some(target_user_id.into()), new_password: Some(new_password.into()) }
    }
}

impl fmt::Debug for ResetRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResetRequest")
            .field("target_user_id", &self.target_user_id)
            .field("new_password", &self.new_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn opt_string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id { S(String), N(i64) }
    Ok(Option::<Id>::deserialize(d)?.map(|id| match id { Id::S(s) => s, Id::N(n) => n.to_string() }))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetConfirmation {
    pub target_id: String,
    pub display_name: String,
    /// Credential account that was changed.
    #[serde(skip_serializing)]
    pub external_ref: String,
}

#[derive(Clone)]
pub struct CredentialResetService {
    verifier: Arc<dyn IdentityVerifier>,
    directory: Arc<dyn UserDirectory>,
    store: Arc<dyn CredentialStore>,
    min_credential_len: usize,
}

impl CredentialResetService {
    pub fn new(verifier: Arc<dyn IdentityVerifier>, directory: Arc<dyn UserDirectory>, store: Arc<dyn CredentialStore>) -> Self {
        Self { verifier, directory, store, min_credential_len: MIN_CREDENTIAL_LEN }
    }

    pub fn with_min_credential_len(mut self, min: usize) -> Self {
        self.min_credential_len = min.max(1);
        self
    }

    /// Reset the target's credential on behalf of the bearer of `token`.
    pub async fn reset_credential(&self, token: Option<&str>, req: &ResetRequest) -> ResetResult<ResetConfirmation> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("reset_credential", request_id = %request_id);
        let mut audit = AuditEvent::start(&request_id);
        audit.target_id = req.target_user_id.clone();

        let result = self.run(token, req, &mut audit).instrument(span).await;
        audit.finish(&result).emit();
        result
    }

    async fn run(&self, token: Option<&str>, req: &ResetRequest, audit: &mut AuditEvent) -> ResetResult<ResetConfirmation> {
        // 1. who is asking
        let token = token.map(str::trim).filter(|t| !t.is_empty()).ok_or(ResetError::Unauthenticated)?;
        let identity = match self.verifier.verify(token).await {
            Ok(Some(identity)) => identity,
            Ok(None) => return Err(ResetError::Unauthenticated),
            Err(e) => {
                tracing::warn!(error = %e, "identity verification failed");
                return Err(ResetError::Unauthenticated);
            }
        };

        // 2. their directory record
        let actor_rec = self.directory.find_active_by_auth_id(&identity.user_id).await
            .map_err(|e| internal("actor lookup", e))?
            .ok_or(ResetError::ActorNotFound)?;
        audit.actor_id = Some(actor_rec.id.clone());
        let actor = Actor::from(&actor_rec);

        // 3-4. input
        let target_id = req.target_user_id.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let new_password = req.new_password.as_deref().filter(|s| !s.is_empty());
        let (Some(target_id), Some(new_password)) = (target_id, new_password) else {
            return Err(ResetError::InvalidInput);
        };
        // Counted the way the browser client counts string length.
        if new_password.encode_utf16().count() < self.min_credential_len {
            return Err(ResetError::WeakCredential { min: self.min_credential_len });
        }

        // 5. target record
        let target_rec = self.directory.find_active_by_id(target_id).await
            .map_err(|e| internal("target lookup", e))?
            .ok_or(ResetError::TargetNotFound)?;
        let target = Target::from(&target_rec);

        // 6. policy
        if let Decision::Deny(reason) = decide(&actor, &target) {
            tracing::warn!(actor = %actor.user_id, target_id = %target.user_id, reason = reason.code(), "credential reset denied");
            return Err(ResetError::Forbidden(reason));
        }

        // 7-8. delegated write
        let external_ref = target.external_ref.as_deref().ok_or(ResetError::TargetNotProvisioned)?;
        if let Err(e) = self.store.set_credential(external_ref, new_password).await {
            tracing::error!(target_id = %target.user_id, error = %e, "credential store rejected reset");
            return Err(ResetError::CredentialStoreError(response::short_diagnostic(&format!("{:#}", e))));
        }

        tracing::info!(actor = %actor.user_id, target_id = %target.user_id, "credential reset");
        Ok(ResetConfirmation { target_id: target.user_id, display_name: target.display_name, external_ref: external_ref.to_string() })
    }
}

fn internal(what: &str, e: anyhow::Error) -> ResetError {
    tracing::error!(error = %e, "{} failed", what);
    ResetError::Internal(format!("{}: {}", what, e))
}
