//! Directory types and filter helpers

use portier_core::config::SearchScope;
use std::collections::HashMap;
use thiserror::Error;

/// LDAP result code for a rejected bind
pub const RC_INVALID_CREDENTIALS: u32 = 49;

// ============================================================================
// Errors
// ============================================================================

/// Failures raised by the directory transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("Failed to connect to directory: {0}")]
    Connect(String),

    #[error("Directory {0} timed out")]
    Timeout(&'static str),

    /// The directory answered the bind and said no
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Bind rejected with code: {0}")]
    BindRejected(u32),

    #[error("Directory protocol error: {0}")]
    Protocol(String),
}

impl DirectoryError {
    /// Whether the directory definitively refused the credential
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            DirectoryError::InvalidCredentials | DirectoryError::BindRejected(_)
        )
    }
}

// ============================================================================
// Search
// ============================================================================

/// A single search against the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub base: String,
    pub scope: SearchScope,
    pub filter: String,
    pub attributes: Vec<String>,
}

/// Entry returned by a search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Entry DN (Distinguished Name)
    pub dn: String,

    /// Raw LDAP attributes
    pub attributes: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Build a user search filter, substituting `{username}` or `%s`
pub fn build_user_filter(template: &str, username: &str) -> String {
    let escaped = ldap3::ldap_escape(username);
    template
        .replace("{username}", &escaped)
        .replace("%s", &escaped)
}

/// Build the DN of a user entry from its RDN attribute and container
pub fn build_user_dn(attribute: &str, username: &str, base_dn: &str) -> String {
    format!("{}={},{}", attribute, ldap3::dn_escape(username), base_dn)
}

/// Build a membership filter, substituting `{dn}`
pub fn build_group_filter(template: &str, user_dn: &str) -> String {
    template.replace("{dn}", &ldap3::ldap_escape(user_dn))
}
