//! LDAP Client implementation
//!
//! Handles LDAP connections, binds and searches over ldap3.
//! Supports LDAP, LDAPS (SSL), and STARTTLS connections.

use super::{
    DirectoryConnector, DirectoryEntry, DirectoryError, DirectorySession, SearchRequest,
    RC_INVALID_CREDENTIALS,
};
use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use portier_core::config::{DirectoryConfig, SearchScope};
use std::time::Duration;
use tracing::debug;

/// Opens one ldap3 connection per session
#[derive(Debug, Clone)]
pub struct LdapConnector {
    url: String,
    start_tls: bool,
    skip_tls_verify: bool,
    timeout: Duration,
}

impl LdapConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            start_tls: false,
            skip_tls_verify: false,
            timeout: Duration::from_secs(portier_core::DEFAULT_DIRECTORY_TIMEOUT_SECS),
        }
    }

    pub fn from_config(config: &DirectoryConfig) -> Self {
        Self {
            url: config.url.clone(),
            start_tls: config.start_tls,
            skip_tls_verify: config.skip_tls_verify,
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn settings(&self) -> LdapConnSettings {
        LdapConnSettings::new()
            .set_conn_timeout(self.timeout)
            .set_starttls(self.start_tls)
            .set_no_tls_verify(self.skip_tls_verify)
    }
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    async fn connect(&self) -> Result<Box<dyn DirectorySession>, DirectoryError> {
        debug!("Connecting to LDAP server: {}", self.url);

        let (conn, ldap) = LdapConnAsync::with_settings(self.settings(), &self.url)
            .await
            .map_err(|e| DirectoryError::Connect(e.to_string()))?;

        ldap3::drive!(conn);

        Ok(Box::new(LdapSession { ldap }))
    }
}

/// A live ldap3 handle
pub struct LdapSession {
    ldap: Ldap,
}

#[async_trait]
impl DirectorySession for LdapSession {
    async fn bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError> {
        // An empty password turns a simple bind into an unauthenticated bind,
        // which most servers accept for any DN
        if password.is_empty() {
            return Err(DirectoryError::InvalidCredentials);
        }

        let result = self
            .ldap
            .simple_bind(dn, password)
            .await
            .map_err(|e| DirectoryError::Protocol(format!("Bind failed: {}", e)))?;

        match result.rc {
            0 => Ok(()),
            RC_INVALID_CREDENTIALS => Err(DirectoryError::InvalidCredentials),
            rc => Err(DirectoryError::BindRejected(rc)),
        }
    }

    async fn search(
        &mut self,
        request: &SearchRequest,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        debug!("Searching {} with filter: {}", request.base, request.filter);

        let (rs, _res) = self
            .ldap
            .search(
                &request.base,
                to_scope(request.scope),
                &request.filter,
                request.attributes.clone(),
            )
            .await
            .map_err(|e| DirectoryError::Protocol(format!("Search failed: {}", e)))?
            .success()
            .map_err(|e| DirectoryError::Protocol(format!("Search error: {}", e)))?;

        let entries: Vec<DirectoryEntry> = rs
            .into_iter()
            .map(|result| {
                let entry = SearchEntry::construct(result);
                DirectoryEntry {
                    dn: entry.dn,
                    attributes: entry.attrs.into_iter().collect(),
                }
            })
            .collect();

        debug!("Search returned {} entries", entries.len());
        Ok(entries)
    }

    async fn unbind(&mut self) -> Result<(), DirectoryError> {
        self.ldap
            .unbind()
            .await
            .map_err(|e| DirectoryError::Protocol(format!("Unbind failed: {}", e)))
    }
}

fn to_scope(scope: SearchScope) -> Scope {
    match scope {
        SearchScope::Base => Scope::Base,
        SearchScope::OneLevel => Scope::OneLevel,
        SearchScope::Subtree => Scope::Subtree,
    }
}
