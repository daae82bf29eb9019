//! Portier Core Library
//!
//! Shared configuration and error types for the Portier authentication gate.

pub mod config;
pub mod error;

pub use config::PortierConfig;
pub use error::{Error, Result};

/// Portier version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default realm announced in `WWW-Authenticate` challenges
pub const DEFAULT_REALM: &str = "Basic realm";

/// Default number of verified credentials kept in memory
pub const DEFAULT_CACHE_CAPACITY: usize = 10;

/// Default lifetime of a verified credential (5 minutes)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default bound on a single directory operation
pub const DEFAULT_DIRECTORY_TIMEOUT_SECS: u64 = 10;
