// src/cache.rs

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

pub const DEFAULT_CACHE_MAX_AGE_SECS: i64 = 300;

/// Key space of the query cache. Mutations never touch entries directly;
/// they invalidate scopes and the next read re-fetches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheScope {
    Leave(String),
    LeaveList,
    /// Balance snapshot, keyed by user id.
    Balance(String),
    /// Transaction ledger, keyed by balance id.
    Transactions(String),
    CalendarRange,
    Calendars,
    Closures,
    Holidays,
    SystemConfig,
}

#[derive(Debug, Clone)]
struct CachedEntry {
    stored_at: DateTime<Utc>,
    value: Value,
}

/// In-memory query cache. Entries go stale after `max_age_secs`; a stale
/// entry is treated as a miss, matching eventual re-fetch semantics.
pub struct QueryCache {
    entries: Mutex<HashMap<CacheScope, CachedEntry>>,
    max_age_secs: i64,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_MAX_AGE_SECS)
    }
}

impl QueryCache {
    pub fn new(max_age_secs: i64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_age_secs,
        }
    }

    pub fn get<T: DeserializeOwned>(&self, scope: &CacheScope) -> Option<T> {
        let entries = self.entries.lock().expect("cache lock poisoned");
        let entry = entries.get(scope)?;
        if Utc::now() - entry.stored_at > Duration::seconds(self.max_age_secs) {
            debug!("Cache stale for {:?}", scope);
            return None;
        }
        match serde_json::from_value(entry.value.clone()) {
            Ok(value) => {
                debug!("Cache hit for {:?}", scope);
                Some(value)
            }
            Err(e) => {
                warn!("Failed to deserialize cached value for {:?}: {}", scope, e);
                None
            }
        }
    }

    pub fn put<T: Serialize>(&self, scope: CacheScope, value: &T) {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to serialize value for cache scope {:?}: {}", scope, e);
                return;
            }
        };
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.insert(
            scope,
            CachedEntry {
                stored_at: Utc::now(),
                value,
            },
        );
    }

    pub fn invalidate(&self, scope: &CacheScope) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        if entries.remove(scope).is_some() {
            debug!("Invalidated cache scope {:?}", scope);
        }
    }

    pub fn invalidate_many(&self, scopes: &[CacheScope]) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        for scope in scopes {
            entries.remove(scope);
        }
        debug!("Invalidated {} cache scopes", scopes.len());
    }

    /// Removes every entry matching the predicate. Used for keyed families
    /// (e.g. all balance snapshots after a leave mutation).
    pub fn invalidate_matching(&self, pred: impl Fn(&CacheScope) -> bool) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.retain(|scope, _| !pred(scope));
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.clear();
        debug!("Cleared query cache");
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
