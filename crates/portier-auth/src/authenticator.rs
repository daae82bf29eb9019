//! Basic-Auth authenticator
//!
//! Turns an `Authorization` header into an [`AuthorizationDecision`]:
//!
//! ```text
//! ParsingHeader -> CacheLookup -> CacheHit ------------------> Decided
//!                              -> CacheMiss -> DirectoryVerify -> Decided
//! ```
//!
//! Verified credentials are cached by principal. The directory is only
//! contacted on a miss, through a session leased for that single attempt.

use crate::cache::CredentialCache;
use crate::ldap::{
    verifier_from_config, DirectoryConnector, DirectoryError, DirectoryVerifier, LdapConnector,
    SessionLease, Verified,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use http::header::AUTHORIZATION;
use http::HeaderMap;
use portier_core::PortierConfig;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, error, info, warn};

// ============================================================================
// Credentials and Identity
// ============================================================================

/// A principal/secret pair taken from a request
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    principal: String,
    secret: String,
}

impl Credentials {
    pub fn new(principal: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            secret: secret.into(),
        }
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("principal", &self.principal)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Identity attached to an allowed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub scheme: &'static str,
    pub principal: String,
}

impl Identity {
    pub fn basic(principal: impl Into<String>) -> Self {
        Self {
            scheme: "basic",
            principal: principal.into(),
        }
    }
}

// ============================================================================
// Errors and Decisions
// ============================================================================

/// Why a request was denied
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing credentials")]
    MissingCredentials,

    #[error("unsupported scheme")]
    UnsupportedScheme,

    #[error("malformed credentials")]
    MalformedCredentials,

    #[error("directory unavailable")]
    DirectoryConnection,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user not found")]
    NotFound,

    #[error("not a member")]
    NotAMember,

    #[error("directory {0} timed out")]
    Timeout(&'static str),
}

impl AuthError {
    /// Whether the request carried no usable Basic credentials at all
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, AuthError::MissingCredentials | AuthError::UnsupportedScheme)
    }
}

impl From<DirectoryError> for AuthError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::InvalidCredentials | DirectoryError::BindRejected(_) => {
                AuthError::InvalidCredentials
            }
            DirectoryError::Timeout(operation) => AuthError::Timeout(operation),
            DirectoryError::Connect(_) | DirectoryError::Protocol(_) => {
                warn!("Directory failure: {}", err);
                AuthError::DirectoryConnection
            }
        }
    }
}

/// Outcome of one authentication attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationDecision {
    Allowed(Identity),
    Unauthenticated(AuthError),
    Forbidden(AuthError),
}

impl AuthorizationDecision {
    /// Deny with the variant matching the failure
    pub fn deny(err: AuthError) -> Self {
        if err.is_unauthenticated() {
            AuthorizationDecision::Unauthenticated(err)
        } else {
            AuthorizationDecision::Forbidden(err)
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthorizationDecision::Allowed(_))
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AuthorizationDecision::Allowed(identity) => Some(identity),
            _ => None,
        }
    }
}

// ============================================================================
// Header parsing
// ============================================================================

/// Extract Basic credentials from request headers
pub fn parse_basic_authorization(headers: &HeaderMap) -> Result<Credentials, AuthError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingCredentials)?
        .as_bytes();

    // Classify the scheme before any text decoding of the value
    let (scheme, encoded) = match header.iter().position(|b| *b == b' ') {
        Some(space) => (&header[..space], &header[space + 1..]),
        None => (header, &[][..]),
    };
    if scheme != b"Basic" {
        return Err(AuthError::UnsupportedScheme);
    }

    let encoded = std::str::from_utf8(encoded).map_err(|_| AuthError::MalformedCredentials)?;
    let decoded = BASE64
        .decode(encoded.trim())
        .map_err(|_| AuthError::MalformedCredentials)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AuthError::MalformedCredentials)?;

    let (principal, secret) = decoded.split_once(':').unwrap_or((decoded.as_str(), ""));
    if principal.is_empty() || secret.is_empty() {
        return Err(AuthError::MalformedCredentials);
    }

    Ok(Credentials::new(principal, secret))
}

// ============================================================================
// Authenticator
// ============================================================================

/// Cache-first credential verifier
pub struct Authenticator {
    connector: Arc<dyn DirectoryConnector>,
    verifier: Arc<dyn DirectoryVerifier>,
    cache: Option<Arc<CredentialCache>>,
    operation_timeout: Duration,
    invalidate_on_mismatch: bool,
}

impl Authenticator {
    pub fn new(
        connector: Arc<dyn DirectoryConnector>,
        verifier: Arc<dyn DirectoryVerifier>,
    ) -> Self {
        Self {
            connector,
            verifier,
            cache: None,
            operation_timeout: Duration::from_secs(portier_core::DEFAULT_DIRECTORY_TIMEOUT_SECS),
            invalidate_on_mismatch: true,
        }
    }

    /// Build an LDAP-backed authenticator from configuration
    pub fn from_config(config: &PortierConfig) -> Self {
        let connector = Arc::new(LdapConnector::from_config(&config.directory));
        let verifier = verifier_from_config(&config.directory);

        let mut authenticator = Self::new(connector, verifier)
            .with_operation_timeout(Duration::from_secs(config.directory.timeout_seconds))
            .with_invalidate_on_mismatch(config.cache.invalidate_on_mismatch);

        if config.cache.enabled {
            authenticator =
                authenticator.with_cache(Arc::new(CredentialCache::from_config(&config.cache)));
        }

        authenticator
    }

    pub fn with_cache(mut self, cache: Arc<CredentialCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn with_invalidate_on_mismatch(mut self, invalidate: bool) -> Self {
        self.invalidate_on_mismatch = invalidate;
        self
    }

    pub fn cache(&self) -> Option<&Arc<CredentialCache>> {
        self.cache.as_ref()
    }

    pub fn verifier_name(&self) -> &'static str {
        self.verifier.name()
    }

    /// Authenticate a request from its headers
    pub async fn authenticate(&self, headers: &HeaderMap) -> AuthorizationDecision {
        match parse_basic_authorization(headers) {
            Ok(credentials) => self.verify_credentials(&credentials).await,
            Err(e) => {
                debug!("Rejecting request before directory lookup: {}", e);
                AuthorizationDecision::deny(e)
            }
        }
    }

    /// Verify already-extracted credentials, consulting the cache first
    pub async fn verify_credentials(&self, credentials: &Credentials) -> AuthorizationDecision {
        let principal = credentials.principal();

        if let Some(cache) = &self.cache {
            match cache.get(principal) {
                Some(cached) if secrets_match(&cached, credentials.secret()) => {
                    debug!("Credential cache hit for {}", principal);
                    return AuthorizationDecision::Allowed(Identity::basic(principal));
                }
                Some(_) => {
                    debug!("Cached secret mismatch for {}", principal);
                    if self.invalidate_on_mismatch {
                        cache.invalidate(principal);
                    }
                }
                None => debug!("Credential cache miss for {}", principal),
            }
        }

        match self.verify_with_directory(credentials).await {
            Ok(verified) => {
                if let Some(cache) = &self.cache {
                    cache.set(principal, credentials.secret());
                }
                info!("Authenticated {} as {}", principal, verified.dn);
                AuthorizationDecision::Allowed(Identity::basic(principal))
            }
            Err(e) => {
                warn!("Denied {}: {}", principal, e);
                AuthorizationDecision::deny(e)
            }
        }
    }

    /// Run one lease from acquire to release on its own task.
    ///
    /// The task is detached from the caller, so dropping the request future
    /// mid-verification still unbinds the session.
    async fn verify_with_directory(&self, credentials: &Credentials) -> Result<Verified, AuthError> {
        let connector = self.connector.clone();
        let verifier = self.verifier.clone();
        let credentials = credentials.clone();
        let timeout = self.operation_timeout;

        let attempt = tokio::spawn(async move {
            let mut lease = match SessionLease::acquire(connector.as_ref(), timeout).await {
                Ok(lease) => lease,
                Err(e) => return Err(AuthError::from(e)),
            };

            let outcome = verifier.verify(&mut lease, &credentials).await;
            lease.release().await;

            outcome
        });

        attempt.await.unwrap_or_else(|e| {
            error!("Directory verification task failed: {}", e);
            Err(AuthError::DirectoryConnection)
        })
    }
}

fn secrets_match(cached: &str, supplied: &str) -> bool {
    cached.as_bytes().ct_eq(supplied.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ldap::{GroupMembershipVerifier, ServiceRebindVerifier};
    use crate::testing::MockDirectory;
    use http::HeaderValue;

    const PEOPLE: &str = "ou=People,dc=example,dc=com";
    const JANE: &str = "uid=jane,ou=People,dc=example,dc=com";
    const APP: &str = "cn=App,ou=Applications,ou=Groups,dc=example,dc=com";
    const ADMIN: &str = "cn=admin,dc=example,dc=com";

    fn basic(principal_and_secret: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let value = format!("Basic {}", BASE64.encode(principal_and_secret));
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&value).unwrap());
        headers
    }

    fn raw(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn cache() -> Arc<CredentialCache> {
        Arc::new(CredentialCache::new(10, Duration::from_secs(300)))
    }

    fn group_authenticator(directory: &MockDirectory) -> Authenticator {
        Authenticator::new(
            Arc::new(directory.clone()),
            Arc::new(GroupMembershipVerifier::new(PEOPLE, APP)),
        )
        .with_cache(cache())
    }

    fn rebind_authenticator(directory: &MockDirectory) -> Authenticator {
        Authenticator::new(
            Arc::new(directory.clone()),
            Arc::new(ServiceRebindVerifier::new(PEOPLE).with_service_account(ADMIN, "admin")),
        )
        .with_cache(cache())
    }

    fn rebind_directory() -> MockDirectory {
        MockDirectory::new()
            .with_user(ADMIN, "admin")
            .with_user(JANE, "secret!")
            .with_entry(JANE, &[("uid", "jane")])
    }

    // ── Header parsing ───────────────────────────────────────────────

    #[test]
    fn test_parse_valid_header() {
        let credentials = parse_basic_authorization(&basic("jane:secret!")).unwrap();
        assert_eq!(credentials.principal(), "jane");
        assert_eq!(credentials.secret(), "secret!");
    }

    #[test]
    fn test_parse_splits_on_first_colon() {
        let credentials = parse_basic_authorization(&basic("jane:pa:ss")).unwrap();
        assert_eq!(credentials.principal(), "jane");
        assert_eq!(credentials.secret(), "pa:ss");
    }

    #[test]
    fn test_parse_missing_header() {
        assert_eq!(
            parse_basic_authorization(&HeaderMap::new()),
            Err(AuthError::MissingCredentials)
        );
    }

    #[test]
    fn test_parse_foreign_scheme() {
        assert_eq!(
            parse_basic_authorization(&raw("Bearer plop")),
            Err(AuthError::UnsupportedScheme)
        );
        assert_eq!(
            parse_basic_authorization(&raw("basic amFuZTpzZWNyZXQh")),
            Err(AuthError::UnsupportedScheme)
        );

        // Non-UTF-8 bytes after a foreign scheme
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_bytes(b"Negotiate \xe9t\xe9").unwrap(),
        );
        assert_eq!(
            parse_basic_authorization(&headers),
            Err(AuthError::UnsupportedScheme)
        );
    }

    #[test]
    fn test_parse_empty_fields() {
        for payload in [":pass", "user:", "user", ":"] {
            assert_eq!(
                parse_basic_authorization(&basic(payload)),
                Err(AuthError::MalformedCredentials),
                "payload {:?}",
                payload
            );
        }
        assert_eq!(
            parse_basic_authorization(&raw("Basic")),
            Err(AuthError::MalformedCredentials)
        );
        assert_eq!(
            parse_basic_authorization(&raw("Basic !!!not-base64")),
            Err(AuthError::MalformedCredentials)
        );
    }

    #[test]
    fn test_directory_errors_carry_no_transport_detail() {
        let err = AuthError::from(DirectoryError::Connect("ldap.internal:389 refused".into()));
        assert_eq!(err, AuthError::DirectoryConnection);
        assert!(!err.to_string().contains("ldap.internal"));

        assert_eq!(
            AuthError::from(DirectoryError::BindRejected(53)),
            AuthError::InvalidCredentials
        );
        assert_eq!(
            AuthError::from(DirectoryError::Timeout("search")),
            AuthError::Timeout("search")
        );
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let rendered = format!("{:?}", Credentials::new("jane", "secret!"));
        assert!(rendered.contains("jane"));
        assert!(!rendered.contains("secret!"));
    }

    // ── Decisions before the directory ───────────────────────────────

    #[tokio::test]
    async fn test_missing_header_is_unauthenticated() {
        let directory = MockDirectory::new();
        let authenticator = group_authenticator(&directory);

        let decision = authenticator.authenticate(&HeaderMap::new()).await;
        assert_eq!(
            decision,
            AuthorizationDecision::Unauthenticated(AuthError::MissingCredentials)
        );
        assert_eq!(directory.connects(), 0);
    }

    #[tokio::test]
    async fn test_foreign_scheme_is_unauthenticated() {
        let directory = MockDirectory::new();
        let authenticator = group_authenticator(&directory);

        let decision = authenticator.authenticate(&raw("Bearer plop")).await;
        assert_eq!(
            decision,
            AuthorizationDecision::Unauthenticated(AuthError::UnsupportedScheme)
        );
    }

    #[tokio::test]
    async fn test_empty_fields_are_forbidden() {
        let directory = MockDirectory::new();
        let authenticator = group_authenticator(&directory);

        for payload in [":pass", "user:"] {
            let decision = authenticator.authenticate(&basic(payload)).await;
            assert_eq!(
                decision,
                AuthorizationDecision::Forbidden(AuthError::MalformedCredentials)
            );
        }
        assert_eq!(directory.connects(), 0);
    }

    // ── Cache ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_cache_hit_skips_directory() {
        let directory = MockDirectory::new();
        let authenticator = group_authenticator(&directory);
        authenticator.cache().unwrap().set("jerome", "secret");

        let decision = authenticator.authenticate(&basic("jerome:secret")).await;
        assert_eq!(decision, AuthorizationDecision::Allowed(Identity::basic("jerome")));
        assert_eq!(directory.connects(), 0);
    }

    #[tokio::test]
    async fn test_cache_mismatch_never_allows() {
        let directory = MockDirectory::new();
        let authenticator = group_authenticator(&directory);
        authenticator.cache().unwrap().set("anotherUser", "anotherPass");

        let decision = authenticator.authenticate(&basic("anotherUser:aBadPassword")).await;
        assert!(!decision.is_allowed());
        assert_eq!(directory.connects(), 1);
        // Stale entry dropped on mismatch
        assert!(!authenticator.cache().unwrap().contains("anotherUser"));
    }

    #[tokio::test]
    async fn test_cache_mismatch_kept_when_invalidation_disabled() {
        let directory = MockDirectory::new();
        let authenticator = group_authenticator(&directory).with_invalidate_on_mismatch(false);
        authenticator.cache().unwrap().set("anotherUser", "anotherPass");

        let decision = authenticator.authenticate(&basic("anotherUser:aBadPassword")).await;
        assert!(!decision.is_allowed());
        assert!(authenticator.cache().unwrap().contains("anotherUser"));
    }

    #[tokio::test]
    async fn test_rotated_password_refreshes_cache() {
        let directory = rebind_directory();
        let authenticator = rebind_authenticator(&directory);
        authenticator.cache().unwrap().set("jane", "old-secret");

        let decision = authenticator.authenticate(&basic("jane:secret!")).await;
        assert!(decision.is_allowed());
        assert_eq!(
            authenticator.cache().unwrap().get("jane").as_deref(),
            Some("secret!")
        );
    }

    #[tokio::test]
    async fn test_without_cache() {
        let directory = rebind_directory();
        let authenticator = Authenticator::new(
            Arc::new(directory.clone()),
            Arc::new(ServiceRebindVerifier::new(PEOPLE).with_service_account(ADMIN, "admin")),
        );

        for _ in 0..2 {
            let decision = authenticator.authenticate(&basic("jane:secret!")).await;
            assert!(decision.is_allowed());
        }
        assert!(authenticator.cache().is_none());
        assert_eq!(directory.connects(), 2);
    }

    // ── Group membership topology ────────────────────────────────────

    #[tokio::test]
    async fn test_group_member_allowed_and_cached() {
        let directory = MockDirectory::new()
            .with_user(JANE, "secret!")
            .with_entry(APP, &[("member", JANE)]);
        let authenticator = group_authenticator(&directory);

        let decision = authenticator.authenticate(&basic("jane:secret!")).await;
        assert_eq!(decision, AuthorizationDecision::Allowed(Identity::basic("jane")));
        assert_eq!(
            authenticator.cache().unwrap().get("jane").as_deref(),
            Some("secret!")
        );

        // Second request is served from the cache
        let decision = authenticator.authenticate(&basic("jane:secret!")).await;
        assert!(decision.is_allowed());
        assert_eq!(directory.connects(), 1);
        assert_eq!(directory.unbinds(), 1);
    }

    #[tokio::test]
    async fn test_group_non_member_forbidden_and_not_cached() {
        let directory = MockDirectory::new()
            .with_user(JANE, "secret!")
            .with_entry(APP, &[("member", "uid=otheruser,ou=People,dc=example,dc=com")]);
        let authenticator = group_authenticator(&directory);

        let decision = authenticator.authenticate(&basic("jane:secret!")).await;
        assert_eq!(decision, AuthorizationDecision::Forbidden(AuthError::NotAMember));
        assert!(authenticator.cache().unwrap().is_empty());
        assert_eq!(directory.unbinds(), 1);
    }

    #[tokio::test]
    async fn test_group_wrong_password_forbidden() {
        let directory = MockDirectory::new()
            .with_user(JANE, "secret!")
            .with_entry(APP, &[("member", JANE)]);
        let authenticator = group_authenticator(&directory);

        let decision = authenticator.authenticate(&basic("jane:notsecret")).await;
        assert_eq!(
            decision,
            AuthorizationDecision::Forbidden(AuthError::InvalidCredentials)
        );
        assert!(authenticator.cache().unwrap().is_empty());
    }

    // ── Service rebind topology ──────────────────────────────────────

    #[tokio::test]
    async fn test_rebind_allowed() {
        let directory = rebind_directory();
        let authenticator = rebind_authenticator(&directory);

        let decision = authenticator.authenticate(&basic("jane:secret!")).await;
        assert_eq!(decision.identity(), Some(&Identity::basic("jane")));
        assert_eq!(directory.unbinds(), 1);
    }

    #[tokio::test]
    async fn test_rebind_unknown_principal_forbidden() {
        let directory = rebind_directory();
        let authenticator = rebind_authenticator(&directory);

        let decision = authenticator.authenticate(&basic("jcreignou:secret!")).await;
        assert_eq!(decision, AuthorizationDecision::Forbidden(AuthError::NotFound));
        assert_eq!(directory.unbinds(), 1);
    }

    #[tokio::test]
    async fn test_rebind_wrong_password_forbidden() {
        let directory = rebind_directory();
        let authenticator = rebind_authenticator(&directory);

        let decision = authenticator.authenticate(&basic("jane:nope")).await;
        assert_eq!(
            decision,
            AuthorizationDecision::Forbidden(AuthError::InvalidCredentials)
        );
        assert!(authenticator.cache().unwrap().is_empty());
        assert_eq!(directory.unbinds(), 1);
    }

    // ── Failures fail closed ─────────────────────────────────────────

    #[tokio::test]
    async fn test_connect_failure_forbidden() {
        let directory = rebind_directory().failing_connect();
        let authenticator = rebind_authenticator(&directory);

        let decision = authenticator.authenticate(&basic("jane:secret!")).await;
        assert!(matches!(
            decision,
            AuthorizationDecision::Forbidden(AuthError::DirectoryConnection)
        ));
        assert_eq!(directory.connects(), 1);
        assert_eq!(directory.unbinds(), 0);
        assert!(authenticator.cache().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_failure_forbidden() {
        let directory = rebind_directory().failing_search();
        let authenticator = rebind_authenticator(&directory);

        let decision = authenticator.authenticate(&basic("jane:secret!")).await;
        assert!(matches!(
            decision,
            AuthorizationDecision::Forbidden(AuthError::DirectoryConnection)
        ));
        assert_eq!(directory.unbinds(), 1);
    }

    #[tokio::test]
    async fn test_timeout_forbidden_and_not_cached() {
        let directory = rebind_directory().with_bind_delay(Duration::from_millis(200));
        let authenticator =
            rebind_authenticator(&directory).with_operation_timeout(Duration::from_millis(20));

        let decision = authenticator.authenticate(&basic("jane:secret!")).await;
        assert_eq!(decision, AuthorizationDecision::Forbidden(AuthError::Timeout("bind")));
        assert!(authenticator.cache().unwrap().is_empty());
        assert_eq!(directory.unbinds(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_attempt_still_unbinds() {
        let directory = rebind_directory().with_bind_delay(Duration::from_millis(200));
        let authenticator = rebind_authenticator(&directory);

        let outcome = tokio::time::timeout(
            Duration::from_millis(50),
            authenticator.authenticate(&basic("jane:secret!")),
        )
        .await;
        assert!(outcome.is_err());

        // Service bind, search and user bind finish on the detached task
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(directory.connects(), 1);
        assert_eq!(directory.unbinds(), directory.connects());
        assert!(authenticator.cache().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unbind_failure_keeps_decision() {
        let directory = rebind_directory().failing_unbind();
        let authenticator = rebind_authenticator(&directory);

        let decision = authenticator.authenticate(&basic("jane:secret!")).await;
        assert!(decision.is_allowed());
        assert_eq!(directory.unbinds(), 1);
    }

    // ── Session hygiene and concurrency ──────────────────────────────

    #[tokio::test]
    async fn test_one_unbind_per_attempt() {
        let directory = rebind_directory();
        let authenticator = rebind_authenticator(&directory);

        let requests = ["jane:secret!", "jane:nope", "ghost:secret!", "jane:other"];
        for request in requests {
            authenticator.authenticate(&basic(request)).await;
        }

        assert_eq!(directory.connects(), requests.len());
        assert_eq!(directory.unbinds(), requests.len());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_distinct_principals() {
        const USERS: usize = 32;

        let mut directory = MockDirectory::new().with_user(ADMIN, "admin");
        for i in 0..USERS {
            let dn = format!("uid=user{},{}", i, PEOPLE);
            let uid = format!("user{}", i);
            directory = directory
                .with_user(&dn, &format!("pw{}", i))
                .with_entry(&dn, &[("uid", uid.as_str())]);
        }

        let authenticator = Arc::new(
            Authenticator::new(
                Arc::new(directory.clone()),
                Arc::new(ServiceRebindVerifier::new(PEOPLE).with_service_account(ADMIN, "admin")),
            )
            .with_cache(Arc::new(CredentialCache::new(USERS * 2, Duration::from_secs(300)))),
        );

        let tasks = (0..USERS).map(|i| {
            let authenticator = authenticator.clone();
            tokio::spawn(async move {
                authenticator
                    .authenticate(&basic(&format!("user{}:pw{}", i, i)))
                    .await
            })
        });
        let decisions = futures::future::join_all(tasks).await;

        for decision in decisions {
            assert!(decision.unwrap().is_allowed());
        }

        let cache = authenticator.cache().unwrap();
        assert_eq!(cache.len(), USERS);
        for i in 0..USERS {
            assert_eq!(
                cache.get(&format!("user{}", i)),
                Some(format!("pw{}", i))
            );
        }
        assert_eq!(directory.unbinds(), USERS);
    }
}
