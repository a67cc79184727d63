//! In-memory keyed store whose entries expire after a period of inactivity.

use bugbot_core::Clock;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

struct Entry<V> {
    value: V,
    touched_at: DateTime<Utc>,
}

/// Outcome of a lookup that distinguishes "never existed" from "timed out".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<V> {
    Live(V),
    /// The entry had expired; it has been removed and is handed back once.
    Expired(V),
    Missing,
}

pub struct ExpiringStore<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, V> ExpiringStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn is_expired(&self, entry: &Entry<V>, now: DateTime<Utc>) -> bool {
        now - entry.touched_at >= self.ttl
    }

    pub fn insert(&self, key: K, value: V) {
        let touched_at = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key, Entry { value, touched_at });
    }

    /// Look up `key`, removing it if it has expired.
    pub fn lookup(&self, key: &K) -> Lookup<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let expired = match entries.get(key) {
            None => return Lookup::Missing,
            Some(entry) => self.is_expired(entry, now),
        };
        if expired {
            return entries
                .remove(key)
                .map_or(Lookup::Missing, |entry| Lookup::Expired(entry.value));
        }
        entries
            .get(key)
            .map_or(Lookup::Missing, |entry| Lookup::Live(entry.value.clone()))
    }

    /// Live value for `key`. An expired entry is removed and reported as absent.
    pub fn get(&self, key: &K) -> Option<V> {
        match self.lookup(key) {
            Lookup::Live(value) => Some(value),
            Lookup::Expired(_) | Lookup::Missing => None,
        }
    }

    /// Reset the inactivity timer. Returns false if the entry is gone or expired.
    pub fn touch(&self, key: &K) -> bool {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get_mut(key) {
            Some(entry) if !self.is_expired(entry, now) => {
                entry.touched_at = now;
                true
            }
            Some(_) => {
                entries.remove(key);
                false
            }
            None => false,
        }
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key).map(|entry| entry.value)
    }

    /// Remove `key` only if `matches` accepts its current value.
    pub fn remove_if(&self, key: &K, matches: impl FnOnce(&V) -> bool) -> Option<V> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.get(key).is_some_and(|entry| matches(&entry.value)) {
            return entries.remove(key).map(|entry| entry.value);
        }
        None
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.drain_expired().len()
    }

    /// Drop every expired entry and return the keys that were removed.
    pub fn drain_expired(&self) -> Vec<K> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let expired: Vec<K> = entries
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.remove(key);
        }
        expired
    }

    /// Number of entries, including any not yet swept.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
