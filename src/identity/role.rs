//! Role hierarchy: a fixed, totally ordered table of privilege ranks.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Developer,
    Admin,
    CompanyAdmin,
    Manager,
    Driver,
    Client,
}

/// Rank reported for role names that are not part of the hierarchy.
pub const UNKNOWN_RANK: u32 = 0;

// Highest privilege first. Ranks must stay unique.
const RANKS: [(Role, &str, u32); 6] = [
    (Role::Developer, "developer", 100),
    (Role::Admin, "admin", 90),
    (Role::CompanyAdmin, "company_admin", 80),
    (Role::Manager, "manager", 70),
    (Role::Driver, "driver", 60),
    (Role::Client, "client", 50),
];

static BY_NAME: Lazy<HashMap<&'static str, Role>> = Lazy::new(|| {
    RANKS.iter().map(|(role, name, _)| (*name, *role)).collect()
});

impl Role {
    /// All roles, highest privilege first.
    pub fn all() -> impl Iterator<Item = Role> {
        RANKS.iter().map(|(role, _, _)| *role)
    }

    pub fn rank(self) -> u32 {
        RANKS.iter().find(|(r, _, _)| *r == self).map(|(_, _, rank)| *rank).unwrap_or(UNKNOWN_RANK)
    }

    pub fn as_str(self) -> &'static str {
        RANKS.iter().find(|(r, _, _)| *r == self).map(|(_, name, _)| *name).unwrap_or("unknown")
    }

    /// Parse a role name as stored in the user directory (case-insensitive, trimmed).
    pub fn from_name(name: &str) -> Option<Role> {
        let key = name.trim().to_ascii_lowercase();
        BY_NAME.get(key.as_str()).copied()
    }

    /// developer and admin: platform-wide administrators.
    pub fn is_top_tier(self) -> bool {
        matches!(self, Role::Developer | Role::Admin)
    }
}

/// Rank of a raw role name; names outside the hierarchy rank 0.
pub fn rank_of(name: &str) -> u32 {
    Role::from_name(name).map(Role::rank).unwrap_or(UNKNOWN_RANK)
}

impl Ord for Role {
    fn cmp(&self, other: &Self) -> Ordering { self.rank().cmp(&other.rank()) }
}

impl PartialOrd for Role {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::from_name(s).ok_or_else(|| UnknownRole(s.to_string()))
    }
}
