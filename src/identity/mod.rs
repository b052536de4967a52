//! Identity, roles and the credential-reset authorization policy.
//! Keep the public surface thin and split implementation across sub-modules.

mod role;
mod principal;
mod authorizer;
mod provider;
mod session;
mod local;

pub use role::{Role, UnknownRole, UNKNOWN_RANK, rank_of};
pub use principal::{Actor, Target, UserRecord};
pub use authorizer::{Decision, DenyReason, decide};
pub use provider::{CredentialStore, IdentityVerifier, UserDirectory, VerifiedIdentity};
pub use session::{Session, SessionManager, SessionToken};
pub use local::{LocalCredentialStore, LocalDirectory, load_seed};
