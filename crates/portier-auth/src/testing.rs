//! In-memory directory double
//!
//! Implements [`DirectoryConnector`] over a fixed set of entries and bind
//! passwords, counting every protocol call so tests can assert session
//! hygiene. Only single `(attr=value)` equality and `(attr=*)` presence
//! filters are understood.

use crate::ldap::{
    DirectoryConnector, DirectoryEntry, DirectoryError, DirectorySession, SearchRequest,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use portier_core::config::SearchScope;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct MockState {
    passwords: Mutex<HashMap<String, String>>,
    entries: Mutex<Vec<DirectoryEntry>>,
    connects: AtomicUsize,
    binds: AtomicUsize,
    searches: AtomicUsize,
    unbinds: AtomicUsize,
    fail_connect: bool,
    fail_search: bool,
    fail_unbind: bool,
    bind_delay: Option<Duration>,
}

/// Directory double shared between a connector and its sessions
#[derive(Clone, Default)]
pub struct MockDirectory {
    state: Arc<MockState>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept binds as `dn` with `password`
    pub fn with_user(self, dn: &str, password: &str) -> Self {
        self.state
            .passwords
            .lock()
            .insert(dn.to_string(), password.to_string());
        self
    }

    /// Add an entry; repeat an attribute name for multiple values
    pub fn with_entry(self, dn: &str, attributes: &[(&str, &str)]) -> Self {
        let mut entry = DirectoryEntry::new(dn);
        for (name, value) in attributes {
            entry
                .attributes
                .entry(name.to_string())
                .or_default()
                .push(value.to_string());
        }
        self.state.entries.lock().push(entry);
        self
    }

    pub fn failing_connect(self) -> Self {
        self.configure(|s| s.fail_connect = true)
    }

    pub fn failing_search(self) -> Self {
        self.configure(|s| s.fail_search = true)
    }

    pub fn failing_unbind(self) -> Self {
        self.configure(|s| s.fail_unbind = true)
    }

    pub fn with_bind_delay(self, delay: Duration) -> Self {
        self.configure(|s| s.bind_delay = Some(delay))
    }

    fn configure(mut self, f: impl FnOnce(&mut MockState)) -> Self {
        let state = Arc::get_mut(&mut self.state)
            .expect("configure the mock directory before sharing it");
        f(state);
        self
    }

    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn binds(&self) -> usize {
        self.state.binds.load(Ordering::SeqCst)
    }

    pub fn searches(&self) -> usize {
        self.state.searches.load(Ordering::SeqCst)
    }

    pub fn unbinds(&self) -> usize {
        self.state.unbinds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectoryConnector for MockDirectory {
    async fn connect(&self) -> Result<Box<dyn DirectorySession>, DirectoryError> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_connect {
            return Err(DirectoryError::Connect("connection refused".to_string()));
        }
        Ok(Box::new(MockSession {
            state: self.state.clone(),
        }))
    }
}

struct MockSession {
    state: Arc<MockState>,
}

#[async_trait]
impl DirectorySession for MockSession {
    async fn bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError> {
        self.state.binds.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.state.bind_delay {
            tokio::time::sleep(delay).await;
        }

        let accepted = self
            .state
            .passwords
            .lock()
            .get(dn)
            .map(|expected| !password.is_empty() && expected == password)
            .unwrap_or(false);

        if accepted {
            Ok(())
        } else {
            Err(DirectoryError::InvalidCredentials)
        }
    }

    async fn search(
        &mut self,
        request: &SearchRequest,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        self.state.searches.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_search {
            return Err(DirectoryError::Protocol("search failed".to_string()));
        }

        let (attribute, value) = parse_filter(&request.filter)?;
        let entries = self.state.entries.lock();

        Ok(entries
            .iter()
            .filter(|entry| in_scope(&entry.dn, &request.base, request.scope))
            .filter(|entry| {
                entry
                    .attributes
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(&attribute))
                    .map(|(_, values)| value == "*" || values.iter().any(|v| *v == value))
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn unbind(&mut self) -> Result<(), DirectoryError> {
        self.state.unbinds.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_unbind {
            return Err(DirectoryError::Protocol("unbind failed".to_string()));
        }
        Ok(())
    }
}

fn parse_filter(filter: &str) -> Result<(String, String), DirectoryError> {
    filter
        .strip_prefix('(')
        .and_then(|f| f.strip_suffix(')'))
        .and_then(|f| f.split_once('='))
        .map(|(attribute, value)| (attribute.to_string(), value.to_string()))
        .ok_or_else(|| DirectoryError::Protocol(format!("Unsupported filter: {}", filter)))
}

fn in_scope(dn: &str, base: &str, scope: SearchScope) -> bool {
    match scope {
        SearchScope::Base => dn == base,
        SearchScope::OneLevel => dn
            .split_once(',')
            .map(|(_, parent)| parent == base)
            .unwrap_or(false),
        SearchScope::Subtree => dn == base || dn.ends_with(&format!(",{}", base)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter() {
        assert_eq!(
            parse_filter("(uid=jane)").unwrap(),
            ("uid".to_string(), "jane".to_string())
        );
        assert_eq!(
            parse_filter("(member=uid=jane,dc=example)").unwrap(),
            ("member".to_string(), "uid=jane,dc=example".to_string())
        );
        assert!(parse_filter("uid=jane").is_err());
    }

    #[test]
    fn test_scopes() {
        let base = "ou=People,dc=example,dc=com";
        assert!(in_scope(base, base, SearchScope::Base));
        assert!(in_scope("uid=a,ou=People,dc=example,dc=com", base, SearchScope::OneLevel));
        assert!(!in_scope("uid=a,ou=x,ou=People,dc=example,dc=com", base, SearchScope::OneLevel));
        assert!(in_scope("uid=a,ou=x,ou=People,dc=example,dc=com", base, SearchScope::Subtree));
        assert!(!in_scope("uid=a,ou=Groups,dc=example,dc=com", base, SearchScope::Subtree));
    }
}
