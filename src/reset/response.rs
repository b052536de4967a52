//! User-facing outcome of a reset request.
//! Pure mapping from result to `{success, message | error}`; one stable message per
//! error kind and locale.

use serde::{Deserialize, Serialize};

use super::ResetConfirmation;
use crate::error::{ResetError, ResetResult};
use crate::identity::DenyReason;

/// Longest collaborator diagnostic that may reach a client.
pub const MAX_DIAGNOSTIC_CHARS: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Bg,
    En,
}

impl std::str::FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bg" | "bg-bg" | "bg_bg" => Ok(Locale::Bg),
            "en" | "en-us" | "en-gb" | "en_us" | "en_gb" => Ok(Locale::En),
            other => Err(format!("unsupported locale '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResetOutcome {
    pub fn ok(message: String) -> Self { Self { success: true, message: Some(message), error: None } }
    pub fn failed(error: String) -> Self { Self { success: false, message: None, error: Some(error) } }
}

pub fn format_result(result: &ResetResult<ResetConfirmation>, locale: Locale) -> ResetOutcome {
    match result {
        Ok(conf) => ResetOutcome::ok(success_message(conf, locale)),
        Err(err) => ResetOutcome::failed(error_message(err, locale)),
    }
}

pub fn success_message(conf: &ResetConfirmation, locale: Locale) -> String {
    match locale {
        Locale::Bg => format!("Паролата на {} е сменена успешно", conf.display_name),
        Locale::En => format!("Password for {} was changed successfully", conf.display_name),
    }
}

pub fn error_message(err: &ResetError, locale: Locale) -> String {
    use Locale::*;
    match (err, locale) {
        (ResetError::Unauthenticated, Bg) => "Неоторизиран достъп".into(),
        (ResetError::Unauthenticated, En) => "Unauthorized".into(),
        (ResetError::ActorNotFound, Bg) => "Потребителят, изпращащ заявката, не е намерен".into(),
        (ResetError::ActorNotFound, En) => "Requesting user not found".into(),
        (ResetError::TargetNotFound, Bg) => "Потребителят не е намерен".into(),
        (ResetError::TargetNotFound, En) => "Target user not found".into(),
        (ResetError::InvalidInput, Bg) => "Липсват задължителни полета: targetUserId и newPassword".into(),
        (ResetError::InvalidInput, En) => "Missing required fields: targetUserId and newPassword".into(),
        (ResetError::WeakCredential { min }, Bg) => format!("Паролата трябва да е поне {} символа", min),
        (ResetError::WeakCredential { min }, En) => format!("Password must be at least {} characters", min),
        (ResetError::Forbidden(reason), _) => forbidden_message(*reason, locale).into(),
        (ResetError::TargetNotProvisioned, Bg) => "Потребителят няма акаунт за вход".into(),
        (ResetError::TargetNotProvisioned, En) => "The user has no login account".into(),
        (ResetError::CredentialStoreError(detail), Bg) => format!("Грешка при смяна на паролата: {}", short_diagnostic(detail)),
        (ResetError::CredentialStoreError(detail), En) => format!("Failed to change password: {}", short_diagnostic(detail)),
        (ResetError::Internal(_), Bg) => "Вътрешна грешка на сървъра".into(),
        (ResetError::Internal(_), En) => "Internal server error".into(),
    }
}

fn forbidden_message(reason: DenyReason, locale: Locale) -> &'static str {
    match (reason, locale) {
        (DenyReason::PeerAdministrator, Locale::Bg) => "Нямате право да сменяте паролата на друг администратор",
        (DenyReason::PeerAdministrator, Locale::En) => "You cannot reset the password of another administrator",
        (DenyReason::CrossTenant, Locale::Bg) => "Нямате право да сменяте пароли на потребители от друга фирма",
        (DenyReason::CrossTenant, Locale::En) => "You cannot reset passwords of users from another company",
        (DenyReason::InsufficientPrivilege, Locale::Bg) => "Нямате право да сменяте паролата на потребител с това ниво на достъп",
        (DenyReason::InsufficientPrivilege, Locale::En) => "You cannot reset the password of a user with this access level",
        (DenyReason::NotPermitted, Locale::Bg) => "Нямате права да сменяте пароли",
        (DenyReason::NotPermitted, Locale::En) => "You do not have permission to reset passwords",
    }
}

/// First line of a collaborator error, capped at [`MAX_DIAGNOSTIC_CHARS`].
pub fn short_diagnostic(detail: &str) -> String {
    let line = detail.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("unknown");
    let mut out: String = line.chars().take(MAX_DIAGNOSTIC_CHARS).collect();
    if line.chars().count() > MAX_DIAGNOSTIC_CHARS { out.push('…'); }
    out
}
