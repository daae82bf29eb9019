//! Credential verification strategies
//!
//! Two bind/search sequences are supported, selected by
//! [`portier_core::config::Topology`]:
//! - group membership: bind as the user's own DN, then require the DN to be
//!   listed in a group or application entry
//! - service rebind: bind as a service account, search the user's entry,
//!   then bind again as the discovered DN with the user's password

use super::{build_group_filter, build_user_dn, build_user_filter, SearchRequest, SessionLease};
use crate::authenticator::{AuthError, Credentials};
use async_trait::async_trait;
use portier_core::config::{DirectoryConfig, SearchScope, Topology};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Proof that the directory accepted a credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    pub dn: String,
}

/// Drives one leased session through a verification sequence
#[async_trait]
pub trait DirectoryVerifier: Send + Sync {
    async fn verify(
        &self,
        lease: &mut SessionLease,
        credentials: &Credentials,
    ) -> Result<Verified, AuthError>;

    fn name(&self) -> &'static str;
}

/// Build the verifier selected by the directory configuration
pub fn verifier_from_config(config: &DirectoryConfig) -> Arc<dyn DirectoryVerifier> {
    match config.topology {
        Topology::GroupMembership => Arc::new(GroupMembershipVerifier::from_config(config)),
        Topology::ServiceRebind => Arc::new(ServiceRebindVerifier::from_config(config)),
    }
}

// ============================================================================
// Group membership
// ============================================================================

#[derive(Debug, Clone)]
pub struct GroupMembershipVerifier {
    user_attribute: String,
    user_base_dn: String,
    group_dn: String,
    group_filter: String,
    scope: SearchScope,
    attributes: Vec<String>,
}

impl GroupMembershipVerifier {
    pub fn new(user_base_dn: impl Into<String>, group_dn: impl Into<String>) -> Self {
        Self {
            user_attribute: "uid".to_string(),
            user_base_dn: user_base_dn.into(),
            group_dn: group_dn.into(),
            group_filter: "(member={dn})".to_string(),
            scope: SearchScope::Subtree,
            attributes: vec!["member".to_string()],
        }
    }

    pub fn from_config(config: &DirectoryConfig) -> Self {
        Self {
            user_attribute: config.user_attribute.clone(),
            user_base_dn: config.user_base_dn.clone(),
            group_dn: config.group_dn.clone(),
            group_filter: config.group_filter.clone(),
            scope: config.search_scope,
            attributes: config.attributes.clone(),
        }
    }

    pub fn user_dn(&self, username: &str) -> String {
        build_user_dn(&self.user_attribute, username, &self.user_base_dn)
    }
}

#[async_trait]
impl DirectoryVerifier for GroupMembershipVerifier {
    async fn verify(
        &self,
        lease: &mut SessionLease,
        credentials: &Credentials,
    ) -> Result<Verified, AuthError> {
        let user_dn = self.user_dn(credentials.principal());

        lease.bind(&user_dn, credentials.secret()).await?;

        let request = SearchRequest {
            base: self.group_dn.clone(),
            scope: self.scope,
            filter: build_group_filter(&self.group_filter, &user_dn),
            attributes: self.attributes.clone(),
        };
        let entries = lease.search(&request).await?;

        if entries.is_empty() {
            debug!("{} is not a member of {}", user_dn, self.group_dn);
            return Err(AuthError::NotAMember);
        }

        Ok(Verified { dn: user_dn })
    }

    fn name(&self) -> &'static str {
        "group_membership"
    }
}

// ============================================================================
// Service rebind
// ============================================================================

#[derive(Debug, Clone)]
pub struct ServiceRebindVerifier {
    service_account: Option<(String, String)>,
    search_base: String,
    search_filter: String,
    scope: SearchScope,
    attributes: Vec<String>,
}

impl ServiceRebindVerifier {
    pub fn new(search_base: impl Into<String>) -> Self {
        Self {
            service_account: None,
            search_base: search_base.into(),
            search_filter: "(uid={username})".to_string(),
            scope: SearchScope::Subtree,
            attributes: vec!["dn".to_string()],
        }
    }

    pub fn with_service_account(mut self, dn: impl Into<String>, password: impl Into<String>) -> Self {
        self.service_account = Some((dn.into(), password.into()));
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.search_filter = filter.into();
        self
    }

    pub fn from_config(config: &DirectoryConfig) -> Self {
        let service_account = match (&config.service_bind_dn, &config.service_bind_password) {
            (Some(dn), Some(password)) => Some((dn.clone(), password.clone())),
            _ => None,
        };

        Self {
            service_account,
            search_base: config.search_base.clone(),
            search_filter: config.search_filter.clone(),
            scope: config.search_scope,
            attributes: config.attributes.clone(),
        }
    }
}

#[async_trait]
impl DirectoryVerifier for ServiceRebindVerifier {
    async fn verify(
        &self,
        lease: &mut SessionLease,
        credentials: &Credentials,
    ) -> Result<Verified, AuthError> {
        // Step 1: Bind with service account, or search anonymously
        if let Some((dn, password)) = &self.service_account {
            lease.bind(dn, password).await.map_err(|e| {
                error!("Service account bind failed: {}", e);
                if e.is_rejection() {
                    AuthError::DirectoryConnection
                } else {
                    AuthError::from(e)
                }
            })?;
        }

        // Step 2: Search for user
        let request = SearchRequest {
            base: self.search_base.clone(),
            scope: self.scope,
            filter: build_user_filter(&self.search_filter, credentials.principal()),
            attributes: self.attributes.clone(),
        };
        let mut entries = lease.search(&request).await?;

        if entries.len() > 1 {
            warn!(
                "Filter {} matched {} entries, refusing ambiguous user",
                request.filter,
                entries.len()
            );
            return Err(AuthError::NotFound);
        }

        let user_dn = match entries.pop() {
            Some(entry) => entry.dn,
            None => return Err(AuthError::NotFound),
        };

        debug!("Found user DN: {}", user_dn);

        // Step 3: Verify user password by binding as the user
        lease.bind(&user_dn, credentials.secret()).await?;

        Ok(Verified { dn: user_dn })
    }

    fn name(&self) -> &'static str {
        "service_rebind"
    }
}
