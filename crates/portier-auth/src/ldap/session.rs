//! Scoped directory session

use super::{DirectoryConnector, DirectoryEntry, DirectoryError, DirectorySession, SearchRequest};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// A directory session owned by exactly one verification attempt.
///
/// Every operation is bounded by the lease timeout. [`SessionLease::release`]
/// unbinds exactly once; the lease is never handed to another attempt, so a
/// session that failed or timed out is discarded with it.
pub struct SessionLease {
    session: Box<dyn DirectorySession>,
    timeout: Duration,
    released: bool,
}

impl SessionLease {
    /// Connect a fresh session
    pub async fn acquire(
        connector: &dyn DirectoryConnector,
        timeout: Duration,
    ) -> Result<Self, DirectoryError> {
        let session = bounded(timeout, "connect", connector.connect()).await?;
        debug!("Directory session acquired");

        Ok(Self {
            session,
            timeout,
            released: false,
        })
    }

    pub async fn bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError> {
        bounded(self.timeout, "bind", self.session.bind(dn, password)).await
    }

    pub async fn search(
        &mut self,
        request: &SearchRequest,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        bounded(self.timeout, "search", self.session.search(request)).await
    }

    /// Unbind and discard the session. Failures are logged, never returned.
    pub async fn release(mut self) {
        self.released = true;
        match bounded(self.timeout, "unbind", self.session.unbind()).await {
            Ok(()) => debug!("Directory session released"),
            Err(e) => warn!("Directory unbind failed, discarding session: {}", e),
        }
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        if !self.released {
            warn!("Directory session dropped without unbind");
        }
    }
}

async fn bounded<T, F>(timeout: Duration, operation: &'static str, fut: F) -> Result<T, DirectoryError>
where
    F: Future<Output = Result<T, DirectoryError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!("Directory {} exceeded {:?}", operation, timeout);
            Err(DirectoryError::Timeout(operation))
        }
    }
}
