use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use chrono::{DateTime, Utc};

use crate::clock::Clock;

use super::{CacheError, CounterCache};

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: i64,
    expires_at: Option<DateTime<Utc>>,
}

/// A process-local counter cache.
///
/// Used when no Redis server is configured, and in tests. Expiry follows the
/// given clock, and expired entries are dropped lazily.
#[derive(Debug)]
pub struct MemoryCounterCache {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCounterCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn live_entries(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>, CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CacheError::Ambiguous("counter map poisoned".to_string()))?;
        let now = self.clock.now();
        entries.retain(|_, entry| entry.expires_at.map_or(true, |at| at > now));
        Ok(entries)
    }
}

#[rocket::async_trait]
impl CounterCache for MemoryCounterCache {
    async fn get(&self, key: &str) -> Result<Option<i64>, CacheError> {
        Ok(self.live_entries()?.get(key).map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CacheError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| CacheError::Ambiguous(format!("invalid ttl: {e}")))?;
        let expires_at = Some(self.clock.now() + ttl);
        self.live_entries()?
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn increment(&self, key: &str) -> Result<i64, CacheError> {
        let mut entries = self.live_entries()?;
        let entry = entries.entry(key.to_string()).or_insert(Entry {
            value: 0,
            expires_at: None,
        });
        entry.value += 1;
        Ok(entry.value)
    }

    async fn scan_delete(&self, prefix: &str) -> Result<u64, CacheError> {
        let mut entries = self.live_entries()?;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }
}
