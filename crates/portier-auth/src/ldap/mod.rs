//! LDAP directory access
//!
//! The directory is reached through two traits so the transport can be
//! swapped for an in-memory double:
//! - [`DirectoryConnector`] opens a fresh session per verification attempt
//! - [`DirectorySession`] performs bind, search and unbind on that session
//!
//! [`SessionLease`] wraps a session with per-operation timeouts and a single
//! release, and the [`DirectoryVerifier`] strategies drive it through one of
//! the two supported bind/search sequences.

mod client;
mod session;
mod types;
mod verifier;

pub use client::{LdapConnector, LdapSession};
pub use session::SessionLease;
pub use types::*;
pub use verifier::{
    verifier_from_config, DirectoryVerifier, GroupMembershipVerifier, ServiceRebindVerifier,
    Verified,
};

use async_trait::async_trait;

/// Opens directory sessions
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    /// Establish a new, unbound session
    async fn connect(&self) -> Result<Box<dyn DirectorySession>, DirectoryError>;
}

/// One logical connection to the directory
#[async_trait]
pub trait DirectorySession: Send {
    /// Authenticate the session as `dn`
    async fn bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError>;

    /// Run a search and collect every returned entry
    async fn search(&mut self, request: &SearchRequest) -> Result<Vec<DirectoryEntry>, DirectoryError>;

    /// Release the session
    async fn unbind(&mut self) -> Result<(), DirectoryError>;
}
