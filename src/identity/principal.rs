use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::role::Role;

/// A row of the user directory as the hosted backend returns it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// External credential-account reference; `None` until the user is provisioned.
    #[serde(default, alias = "auth_user_id")]
    pub auth_id: Option<String>,
    #[serde(default)]
    pub role: String,
    #[serde(default, alias = "tenant")]
    pub company_code: Option<String>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_owner: bool,
    #[serde(default, alias = "display_name")]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    pub fn new<S: Into<String>>(id: S, role: Role) -> Self {
        Self { id: id.into(), role: role.as_str().to_string(), ..Default::default() }
    }

    pub fn with_auth_id<S: Into<String>>(mut self, auth_id: S) -> Self { self.auth_id = Some(auth_id.into()); self }
    pub fn with_company<S: Into<String>>(mut self, code: S) -> Self { self.company_code = Some(code.into()); self }
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self { self.name = name.into(); self }
    pub fn with_email<S: Into<String>>(mut self, email: S) -> Self { self.email = Some(email.into()); self }
    pub fn owner(mut self) -> Self { self.is_owner = true; self }

    pub fn is_active(&self) -> bool { self.deleted_at.is_none() }

    /// The provisioned external account, ignoring blank references.
    pub fn external_credential_ref(&self) -> Option<&str> {
        self.auth_id.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// The authenticated requester, rebuilt for every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub role: Option<Role>,
    pub tenant: Option<String>,
    pub is_owner: bool,
}

impl From<&UserRecord> for Actor {
    fn from(rec: &UserRecord) -> Self {
        Self {
            user_id: rec.id.clone(),
            role: Role::from_name(&rec.role),
            tenant: normalize_tenant(rec.company_code.as_deref()),
            is_owner: rec.is_owner,
        }
    }
}

/// The user whose credential is being reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub user_id: String,
    pub role: Option<Role>,
    /// Raw role name from the directory; unknown names still rank 0.
    pub role_name: String,
    pub tenant: Option<String>,
    pub external_ref: Option<String>,
    pub display_name: String,
}

impl From<&UserRecord> for Target {
    fn from(rec: &UserRecord) -> Self {
        Self {
            user_id: rec.id.clone(),
            role: Role::from_name(&rec.role),
            role_name: rec.role.clone(),
            tenant: normalize_tenant(rec.company_code.as_deref()),
            external_ref: rec.external_credential_ref().map(str::to_string),
            display_name: if rec.name.trim().is_empty() { rec.id.clone() } else { rec.name.clone() },
        }
    }
}

fn normalize_tenant(code: Option<&str>) -> Option<String> {
    code.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id { S(String), N(i64) }
    Ok(match Id::deserialize(d)? { Id::S(s) => s, Id::N(n) => n.to_string() })
}

fn null_as_false<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(d)?.unwrap_or(false))
}
