//! Contracts for the external collaborators the reset flow depends on.
//! Implementations own their own timeouts and concurrency control.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::principal::UserRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    /// Id of the external auth account the token belongs to.
    pub user_id: String,
}

#[async_trait::async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// `Ok(None)` when the token is not valid; `Err` when verification itself failed.
    async fn verify(&self, token: &str) -> Result<Option<VerifiedIdentity>>;
}

/// Read access to the user directory.
///
/// Both lookups only ever return active rows: records with a `deleted_at` timestamp
/// are filtered out by the implementation.
#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_active_by_auth_id(&self, auth_id: &str) -> Result<Option<UserRecord>>;
    async fn find_active_by_id(&self, id: &str) -> Result<Option<UserRecord>>;
}

#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn set_credential(&self, external_ref: &str, new_credential: &str) -> Result<()>;
}
