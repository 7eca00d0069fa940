//! Anti-CSRF state tokens.
//!
//! A state token is issued when the browser is sent to the provider and
//! checked when the provider sends it back. Tokens are bound to the client
//! ID and the caller's IP, expire after [`state_ttl`], and are consumed by
//! a successful check so a captured callback URL cannot be replayed.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

/// Length of generated state tokens.
pub const STATE_LENGTH: usize = 16;

const STATE_TTL_SECONDS: i64 = 300;

/// How long a state token stays valid.
#[must_use]
pub fn state_ttl() -> Duration {
    Duration::seconds(STATE_TTL_SECONDS)
}

const SHARD_COUNT: usize = 16;

/// Storage for issued state tokens.
///
/// The bundled [`MemoryStateStore`] is per-process; deployments running
/// several instances behind a load balancer need a shared implementation.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Issues a fresh token bound to `client_id` and `ip`.
    async fn generate_state(&self, client_id: &str, ip: &str) -> String;

    /// Checks a returned token, consuming it on success.
    ///
    /// Returns `true` iff the token is known, unexpired, and was issued to
    /// the same IP. A mismatched IP leaves the entry in place.
    async fn verify_state(&self, client_id: &str, ip: &str, token: &str) -> bool;
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
struct StateEntry {
    ip: String,
    expires_at: DateTime<Utc>,
}

/// In-memory, sharded state store.
pub struct MemoryStateStore {
    shards: Vec<Mutex<HashMap<String, StateEntry>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

fn state_key(client_id: &str, token: &str) -> String {
    format!("{client_id}_{token}")
}

impl MemoryStateStore {
    /// Creates a store using wall-clock time and the standard TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock), state_ttl())
    }

    /// Creates a store with an injected clock and TTL.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
            ttl,
            clock,
        }
    }

    fn shard(&self, key: &str) -> &Mutex<HashMap<String, StateEntry>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % self.shards.len()]
    }

    /// Returns the number of live entries across all shards.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.shards
            .iter()
            .map(|shard| {
                let entries = shard.lock().unwrap_or_else(|e| e.into_inner());
                entries.values().filter(|e| e.expires_at > now).count()
            })
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, key: String, ip: &str) {
        let now = self.clock.now();
        let mut entries = self.shard(&key).lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key,
            StateEntry {
                ip: ip.to_string(),
                expires_at: now + self.ttl,
            },
        );
    }

    fn take_if_matches(&self, key: &str, ip: &str) -> bool {
        let now = self.clock.now();
        let mut entries = self.shard(key).lock().unwrap_or_else(|e| e.into_inner());
        let verdict = entries
            .get(key)
            .map(|entry| (entry.expires_at <= now, entry.ip == ip));
        match verdict {
            Some((true, _)) => {
                entries.remove(key);
                false
            }
            Some((false, true)) => {
                entries.remove(key);
                true
            }
            _ => false,
        }
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn generate_state(&self, client_id: &str, ip: &str) -> String {
        let token = fedgate_core::random::alphanumeric(STATE_LENGTH);
        self.insert(state_key(client_id, &token), ip);
        tracing::debug!(client_id, "issued sso state token");
        token
    }

    async fn verify_state(&self, client_id: &str, ip: &str, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }
        let valid = self.take_if_matches(&state_key(client_id, token), ip);
        if !valid {
            tracing::debug!(client_id, "sso state token rejected");
        }
        valid
    }
}
