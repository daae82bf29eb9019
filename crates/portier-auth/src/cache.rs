//! Verified-credential cache
//!
//! Bounded LRU keyed by principal with an absolute TTL per entry. Expiry is
//! checked lazily on access; there is no background sweeper.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tracing::trace;

/// Process-wide cache of secrets that the directory has already accepted
pub struct CredentialCache {
    state: Mutex<CacheState>,
    capacity: usize,
    ttl: Duration,
}

struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// Recency order, oldest tick first
    recency: BTreeMap<u64, String>,
    tick: u64,
}

struct CacheEntry {
    secret: String,
    verified_at: Instant,
    last_used: u64,
}

impl CacheState {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn remove(&mut self, principal: &str) -> bool {
        match self.entries.remove(principal) {
            Some(entry) => {
                self.recency.remove(&entry.last_used);
                true
            }
            None => false,
        }
    }

    fn evict_lru(&mut self) {
        if let Some((_, principal)) = self.recency.pop_first() {
            self.entries.remove(&principal);
            trace!(principal = %principal, "Evicted least recently used credential");
        }
    }
}

impl CredentialCache {
    /// Create a cache holding at most `capacity` principals for `ttl` each
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::with_capacity(capacity),
                recency: BTreeMap::new(),
                tick: 0,
            }),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub fn from_config(config: &portier_core::config::CacheConfig) -> Self {
        Self::new(config.capacity, Duration::from_secs(config.ttl_seconds))
    }

    /// Look up the last verified secret for a principal.
    ///
    /// Marks the entry as recently used. An expired entry is dropped and
    /// reported as absent.
    pub fn get(&self, principal: &str) -> Option<String> {
        let mut state = self.state.lock();
        let tick = state.next_tick();

        let (expired, previous) = match state.entries.get(principal) {
            Some(entry) => (entry.verified_at.elapsed() >= self.ttl, entry.last_used),
            None => return None,
        };

        if expired {
            state.remove(principal);
            trace!(principal = %principal, "Cached credential expired");
            return None;
        }

        state.recency.remove(&previous);
        state.recency.insert(tick, principal.to_string());

        let entry = state.entries.get_mut(principal)?;
        entry.last_used = tick;
        Some(entry.secret.clone())
    }

    /// Record a secret the directory just accepted, restarting its TTL
    pub fn set(&self, principal: &str, secret: &str) {
        let mut state = self.state.lock();
        let tick = state.next_tick();

        if let Some(previous) = state.entries.get(principal).map(|e| e.last_used) {
            state.recency.remove(&previous);
        } else {
            while state.entries.len() >= self.capacity {
                state.evict_lru();
            }
        }

        state.entries.insert(
            principal.to_string(),
            CacheEntry {
                secret: secret.to_string(),
                verified_at: Instant::now(),
                last_used: tick,
            },
        );
        state.recency.insert(tick, principal.to_string());
    }

    /// Drop a cached secret. Returns whether an entry was present.
    pub fn invalidate(&self, principal: &str) -> bool {
        self.state.lock().remove(principal)
    }

    pub fn contains(&self, principal: &str) -> bool {
        self.get(principal).is_some()
    }

    /// Number of stored entries, including expired ones not yet accessed
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.recency.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
