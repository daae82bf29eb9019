//! Configuration for Portier

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortierConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub directory: DirectoryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PortierConfig {
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::ConfigRead(format!("{}: {}", path, e)))?;

        toml::from_str(&content).map_err(|e| crate::Error::ConfigParse(e.to_string()))
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("PORTIER_BIND_ADDRESS") {
            config.server.bind_address = addr;
        }
        if let Ok(port) = std::env::var("PORTIER_PORT") {
            if let Ok(p) = port.parse() {
                config.server.port = p;
            }
        }
        if let Ok(level) = std::env::var("PORTIER_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(realm) = std::env::var("PORTIER_REALM") {
            config.auth.browser_challenge = Some(BrowserChallenge { realm });
        }

        // Credential cache
        if std::env::var("PORTIER_CACHE_DISABLED").map(|v| v == "true").unwrap_or(false) {
            config.cache.enabled = false;
        }
        if let Ok(ttl) = std::env::var("PORTIER_CACHE_TTL") {
            if let Ok(t) = ttl.parse() {
                config.cache.ttl_seconds = t;
            }
        }

        // Directory from environment
        if let Ok(url) = std::env::var("PORTIER_LDAP_URL") {
            config.directory.url = url;
        }
        if let Ok(dn) = std::env::var("PORTIER_LDAP_BIND_DN") {
            config.directory.service_bind_dn = Some(dn);
        }
        if let Ok(password) = std::env::var("PORTIER_LDAP_BIND_PASSWORD") {
            config.directory.service_bind_password = Some(password);
        }
        if let Ok(base) = std::env::var("PORTIER_LDAP_SEARCH_BASE") {
            config.directory.search_base = base;
        }
        if let Ok(filter) = std::env::var("PORTIER_LDAP_SEARCH_FILTER") {
            config.directory.search_filter = filter;
        }

        config
    }

    pub fn validate(&self) -> crate::Result<()> {
        self.auth.validate()?;
        self.cache.validate()?;
        self.directory.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 30,
        }
    }
}

/// Caller-visible behavior of the gate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Emit `WWW-Authenticate: Basic realm="..."` on 401 responses
    #[serde(default)]
    pub browser_challenge: Option<BrowserChallenge>,

    /// How denials are mapped onto status codes
    #[serde(default)]
    pub deny_mode: DenyMode,
}

impl AuthConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if let Some(ref challenge) = self.browser_challenge {
            if challenge.realm.is_empty() {
                return Err(crate::Error::InvalidConfig("Realm must not be empty".into()));
            }
            if challenge.realm.contains('"') {
                return Err(crate::Error::InvalidConfig(
                    "Realm must not contain double quotes".into(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserChallenge {
    pub realm: String,
}

impl Default for BrowserChallenge {
    fn default() -> Self {
        Self {
            realm: crate::DEFAULT_REALM.to_string(),
        }
    }
}

/// Status code policy for denied requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DenyMode {
    /// 401 for absent credentials or foreign schemes, 403 for rejected credentials
    #[default]
    Strict,
    /// 401 for every denial
    Uniform,
}

/// Verified-credential cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Maximum number of principals kept
    pub capacity: usize,
    /// Lifetime of a verified credential in seconds
    pub ttl_seconds: u64,
    /// Drop a cached secret as soon as a different one is presented
    pub invalidate_on_mismatch: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: crate::DEFAULT_CACHE_CAPACITY,
            ttl_seconds: crate::DEFAULT_CACHE_TTL_SECS,
            invalidate_on_mismatch: true,
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.enabled && self.capacity == 0 {
            return Err(crate::Error::InvalidConfig(
                "Cache capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Which bind/search sequence proves a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Bind as the user's own DN, then look the DN up in a group entry
    GroupMembership,
    /// Bind as a service account, search the user's DN, rebind as that DN
    #[default]
    ServiceRebind,
}

/// LDAP search scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    Base,
    #[serde(alias = "one")]
    OneLevel,
    #[default]
    #[serde(alias = "sub")]
    Subtree,
}

/// Directory server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// LDAP server URL (ldap:// or ldaps://)
    /// Example: "ldap://ldap.example.com:389"
    pub url: String,

    /// Use STARTTLS for connection upgrade
    pub start_tls: bool,

    /// Skip TLS certificate verification
    pub skip_tls_verify: bool,

    pub topology: Topology,

    /// Service account used before the user search
    /// Example: "cn=admin,dc=example,dc=com"
    pub service_bind_dn: Option<String>,

    pub service_bind_password: Option<String>,

    /// Base DN for user searches
    pub search_base: String,

    /// User search filter, `{username}` or `%s` is replaced with the principal
    pub search_filter: String,

    pub search_scope: SearchScope,

    /// Attributes requested from matched entries
    pub attributes: Vec<String>,

    /// Container holding user entries, used to build the user DN
    /// Example: "ou=People,dc=example,dc=com"
    pub user_base_dn: String,

    /// RDN attribute of user entries
    pub user_attribute: String,

    /// Group or application entry membership is checked against
    /// Example: "cn=App,ou=Applications,ou=Groups,dc=example,dc=com"
    pub group_dn: String,

    /// Membership filter, `{dn}` is replaced with the user DN
    pub group_filter: String,

    /// Bound on each directory operation, in seconds
    pub timeout_seconds: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            url: "ldap://localhost:389".to_string(),
            start_tls: false,
            skip_tls_verify: false,
            topology: Topology::default(),
            service_bind_dn: None,
            service_bind_password: None,
            search_base: String::new(),
            search_filter: "(uid={username})".to_string(),
            search_scope: SearchScope::default(),
            attributes: vec!["dn".to_string()],
            user_base_dn: String::new(),
            user_attribute: "uid".to_string(),
            group_dn: String::new(),
            group_filter: "(member={dn})".to_string(),
            timeout_seconds: crate::DEFAULT_DIRECTORY_TIMEOUT_SECS,
        }
    }
}

impl DirectoryConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.url.is_empty() {
            return Err(crate::Error::InvalidConfig("Directory URL is required".into()));
        }

        if !self.url.starts_with("ldap://") && !self.url.starts_with("ldaps://") {
            return Err(crate::Error::InvalidConfig(
                "Directory URL must start with ldap:// or ldaps://".into(),
            ));
        }

        if self.timeout_seconds == 0 {
            return Err(crate::Error::InvalidConfig(
                "Directory timeout must be greater than zero".into(),
            ));
        }

        if self.skip_tls_verify {
            tracing::warn!("TLS certificate verification is disabled for {}", self.url);
        }

        match self.topology {
            Topology::GroupMembership => {
                if self.user_base_dn.is_empty() || self.user_attribute.is_empty() {
                    return Err(crate::Error::InvalidConfig(
                        "Group membership requires user_base_dn and user_attribute".into(),
                    ));
                }
                if self.group_dn.is_empty() {
                    return Err(crate::Error::InvalidConfig(
                        "Group membership requires group_dn".into(),
                    ));
                }
                if !self.group_filter.contains("{dn}") {
                    return Err(crate::Error::InvalidConfig(
                        "Group filter must contain {dn} placeholder".into(),
                    ));
                }
            }
            Topology::ServiceRebind => {
                if self.search_base.is_empty() {
                    return Err(crate::Error::InvalidConfig("Search base is required".into()));
                }
                if !self.search_filter.contains("{username}") && !self.search_filter.contains("%s")
                {
                    return Err(crate::Error::InvalidConfig(
                        "Search filter must contain {username} or %s placeholder".into(),
                    ));
                }
                if self.service_bind_dn.is_some() != self.service_bind_password.is_some() {
                    return Err(crate::Error::InvalidConfig(
                        "Service bind DN and password must be set together".into(),
                    ));
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn service_rebind() -> DirectoryConfig {
        DirectoryConfig {
            search_base: "ou=People,dc=example,dc=com".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_validate() {
        let mut config = PortierConfig::default();
        // Should fail - no search base
        assert!(config.validate().is_err());

        config.directory = service_rebind();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.capacity, 10);
        assert_eq!(config.cache.ttl_seconds, 300);
        assert_eq!(config.auth.deny_mode, DenyMode::Strict);
    }

    #[test]
    fn test_directory_url_scheme() {
        let mut directory = service_rebind();
        directory.url = "http://ldap.example.com".to_string();
        assert!(directory.validate().is_err());

        directory.url = "ldaps://ldap.example.com:636".to_string();
        assert!(directory.validate().is_ok());
    }

    #[test]
    fn test_search_filter_placeholder() {
        let mut directory = service_rebind();
        directory.search_filter = "(uid=jane)".to_string();
        assert!(directory.validate().is_err());

        directory.search_filter = "(uid=%s)".to_string();
        assert!(directory.validate().is_ok());
    }

    #[test]
    fn test_service_bind_pairing() {
        let mut directory = service_rebind();
        directory.service_bind_dn = Some("cn=admin,dc=example,dc=com".to_string());
        assert!(directory.validate().is_err());

        directory.service_bind_password = Some("secret".to_string());
        assert!(directory.validate().is_ok());
    }

    #[test]
    fn test_group_membership_requirements() {
        let mut directory = DirectoryConfig {
            topology: Topology::GroupMembership,
            ..Default::default()
        };
        assert!(directory.validate().is_err());

        directory.user_base_dn = "ou=People,dc=example,dc=com".to_string();
        directory.group_dn = "cn=App,ou=Groups,dc=example,dc=com".to_string();
        assert!(directory.validate().is_ok());
    }

    #[test]
    fn test_realm_validation() {
        let mut auth = AuthConfig {
            browser_challenge: Some(BrowserChallenge {
                realm: "say \"hi\"".to_string(),
            }),
            ..Default::default()
        };
        assert!(auth.validate().is_err());

        auth.browser_challenge = Some(BrowserChallenge::default());
        assert!(auth.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let cache = CacheConfig {
            capacity: 0,
            ..Default::default()
        };
        assert!(cache.validate().is_err());

        let disabled = CacheConfig {
            enabled: false,
            capacity: 0,
            ..Default::default()
        };
        assert!(disabled.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[auth]
deny_mode = "uniform"

[auth.browser_challenge]
realm = "intranet"

[cache]
enabled = true
capacity = 50
ttl_seconds = 60
invalidate_on_mismatch = false

[directory]
url = "ldap://127.0.0.1:389"
topology = "group_membership"
user_base_dn = "ou=People,dc=example,dc=com"
group_dn = "cn=App,ou=Applications,ou=Groups,dc=example,dc=com"
search_scope = "sub"
"#
        )
        .unwrap();

        let config = PortierConfig::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.auth.deny_mode, DenyMode::Uniform);
        assert_eq!(
            config.auth.browser_challenge,
            Some(BrowserChallenge {
                realm: "intranet".to_string()
            })
        );
        assert_eq!(config.cache.capacity, 50);
        assert!(!config.cache.invalidate_on_mismatch);
        assert_eq!(config.directory.topology, Topology::GroupMembership);
        assert_eq!(config.directory.search_scope, SearchScope::Subtree);
        assert_eq!(config.directory.group_filter, "(member={dn})");
        assert_eq!(config.server.port, 8080);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_missing() {
        let err = PortierConfig::from_file("/nonexistent/portier.toml").unwrap_err();
        assert!(matches!(err, crate::Error::ConfigRead(_)));
    }
}
