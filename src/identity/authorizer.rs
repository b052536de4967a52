//! Credential-reset authorization policy.
//! Pure decision over two small values; callers resolve actor and target beforehand.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::principal::{Actor, Target};
use super::role::{rank_of, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    PeerAdministrator,
    CrossTenant,
    InsufficientPrivilege,
    NotPermitted,
}

impl DenyReason {
    pub fn code(self) -> &'static str {
        match self {
            DenyReason::PeerAdministrator => "peer_administrator",
            DenyReason::CrossTenant => "cross_tenant",
            DenyReason::InsufficientPrivilege => "insufficient_privilege",
            DenyReason::NotPermitted => "not_permitted",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DenyReason::PeerAdministrator => "cannot act on a peer administrator",
            DenyReason::CrossTenant => "cross-tenant",
            DenyReason::InsufficientPrivilege => "insufficient privilege",
            DenyReason::NotPermitted => "not permitted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool { matches!(self, Decision::Allow) }
}

/// Decide whether `actor` may reset the credential of `target`.
///
/// Rules apply in order:
/// 1. developer/admin may reset anyone except another developer/admin, across tenants.
/// 2. company_admin, or any owner-flagged actor, may reset users of its own company
///    ranked strictly below company_admin.
/// 3. Everyone else is denied.
///
/// Rule 2 is capped at the company_admin rank rather than the actor's own rank, so an
/// owner holding a lower role gets the same ceiling as a company_admin. If owners are
/// ever given a role above company_admin this ceiling will under-grant them.
pub fn decide(actor: &Actor, target: &Target) -> Decision {
    if actor.role.is_some_and(Role::is_top_tier) {
        if target.role.is_some_and(Role::is_top_tier) {
            return Decision::Deny(DenyReason::PeerAdministrator);
        }
        return Decision::Allow;
    }

    if actor.role == Some(Role::CompanyAdmin) || actor.is_owner {
        if actor.tenant != target.tenant {
            return Decision::Deny(DenyReason::CrossTenant);
        }
        if rank_of(&target.role_name) >= Role::CompanyAdmin.rank() {
            return Decision::Deny(DenyReason::InsufficientPrivilege);
        }
        return Decision::Allow;
    }

    Decision::Deny(DenyReason::NotPermitted)
}
