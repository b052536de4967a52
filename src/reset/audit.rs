//! Information attached to credential-reset audit events.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ResetError, ResetResult};

/// Tracing target audit events are logged under.
pub const AUDIT_TARGET: &str = "audit";

/// Event code for credential-reset audit events.
pub const AUDIT_CREDENTIAL_RESET: &str = "AUDIT_CREDENTIAL_RESET";

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub code: String,
    pub timestamp: DateTime<Utc>,
    pub request_id: String,

    /// Directory id of the requester, once resolved.
    pub actor_id: Option<String>,

    /// Requested target id, as sent by the client.
    pub target_id: Option<String>,

    pub decision: AuditDecision,

    /// Error code when the request did not succeed.
    pub error: Option<String>,
}

/// Decision reported in an [`AuditEvent`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum AuditDecision {
    /// The credential was reset.
    Allow,

    /// Authentication or authorization refused the request.
    Deny,

    /// The request failed for any other reason (so nothing was changed).
    Error,
}

impl<T> From<&ResetResult<T>> for AuditDecision {
    fn from(value: &ResetResult<T>) -> Self {
        match value {
            Ok(_) => AuditDecision::Allow,
            Err(ResetError::Unauthenticated | ResetError::Forbidden(_)) => AuditDecision::Deny,
            Err(_) => AuditDecision::Error,
        }
    }
}

impl AuditEvent {
    pub fn start(request_id: &str) -> Self {
        Self {
            code: AUDIT_CREDENTIAL_RESET.to_string(),
            timestamp: Utc::now(),
            request_id: request_id.to_string(),
            actor_id: None,
            target_id: None,
            decision: AuditDecision::Error,
            error: None,
        }
    }

    pub fn finish<T>(mut self, result: &ResetResult<T>) -> Self {
        self.decision = AuditDecision::from(result);
        self.error = result.as_ref().err().map(|e| e.code().to_string());
        self
    }

    /// Log the event. Serialization problems are logged and otherwise ignored.
    pub fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(payload) => tracing::info!(target: AUDIT_TARGET, decision = ?self.decision, %payload, "credential reset audited"),
            Err(error) => tracing::error!(target: AUDIT_TARGET, %error, "failed to serialise credential reset audit event"),
        }
    }
}
