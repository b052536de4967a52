//! Error model for the credential-reset flow.
//! Every variant has a stable code and HTTP status; user-facing text lives in
//! `reset::response`.

use crate::identity::DenyReason;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResetError {
    #[error("missing or invalid bearer token")]
    Unauthenticated,
    #[error("requesting user not found")]
    ActorNotFound,
    #[error("target user not found")]
    TargetNotFound,
    #[error("targetUserId and newPassword are required")]
    InvalidInput,
    #[error("new password shorter than {min} characters")]
    WeakCredential { min: usize },
    #[error("forbidden: {0}")]
    Forbidden(DenyReason),
    #[error("target user has no credential account")]
    TargetNotProvisioned,
    #[error("credential store error: {0}")]
    CredentialStoreError(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ResetError {
    pub fn code(&self) -> &'static str {
        match self {
            ResetError::Unauthenticated => "unauthenticated",
            ResetError::ActorNotFound => "actor_not_found",
            ResetError::TargetNotFound => "target_not_found",
            ResetError::InvalidInput => "invalid_input",
            ResetError::WeakCredential { .. } => "weak_credential",
            ResetError::Forbidden(_) => "forbidden",
            ResetError::TargetNotProvisioned => "target_not_provisioned",
            ResetError::CredentialStoreError(_) => "credential_store_error",
            ResetError::Internal(_) => "internal",
        }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            ResetError::InvalidInput | ResetError::WeakCredential { .. } => 400,
            ResetError::Unauthenticated => 401,
            ResetError::Forbidden(_) => 403,
            ResetError::ActorNotFound | ResetError::TargetNotFound => 404,
            ResetError::TargetNotProvisioned => 409,
            ResetError::CredentialStoreError(_) => 502,
            ResetError::Internal(_) => 500,
        }
    }
}

impl From<anyhow::Error> for ResetError {
    fn from(err: anyhow::Error) -> Self {
        ResetError::Internal(err.to_string())
    }
}

pub type ResetResult<T> = Result<T, ResetError>;
