//! Authentication for Portier
//!
//! Verifies HTTP Basic credentials against an LDAP directory and keeps
//! recently verified credentials in a bounded in-memory cache.

pub mod authenticator;
pub mod cache;
pub mod ldap;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use authenticator::{
    parse_basic_authorization, AuthError, AuthorizationDecision, Authenticator, Credentials,
    Identity,
};
pub use cache::CredentialCache;
pub use ldap::{
    DirectoryConnector, DirectoryEntry, DirectoryError, DirectorySession, DirectoryVerifier,
    GroupMembershipVerifier, LdapConnector, SearchRequest, ServiceRebindVerifier, SessionLease,
    Verified,
};
