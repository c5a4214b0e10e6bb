// src/push/cache.rs
//! Time-bounded key sets/maps with independent per-key expiry.
//!
//! Time is passed in explicitly (`now`), so callers decide the clock and tests
//! stay deterministic. Expired entries are dropped lazily on read, and a full
//! sweep runs every `SWEEP_EVERY` writes to bound memory.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::Duration;

use crate::feed::types::GroupId;

const SWEEP_EVERY: usize = 256;

pub(crate) fn to_chrono(d: Duration) -> ChronoDuration {
    ChronoDuration::from_std(d).unwrap_or_else(|_| ChronoDuration::days(365 * 100))
}

#[derive(Debug, Clone)]
pub struct TtlCache<K, V = ()> {
    entries: HashMap<K, (V, DateTime<Utc>)>,
    default_ttl: ChronoDuration,
    writes: usize,
}

impl<K: Eq + Hash, V> TtlCache<K, V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            default_ttl: to_chrono(default_ttl),
            writes: 0,
        }
    }

    pub fn insert(&mut self, key: K, value: V, now: DateTime<Utc>) {
        let ttl = self.default_ttl;
        self.insert_until(key, value, now + ttl, now);
    }

    pub fn insert_with_ttl(&mut self, key: K, value: V, ttl: Duration, now: DateTime<Utc>) {
        self.insert_until(key, value, now + to_chrono(ttl), now);
    }

    fn insert_until(&mut self, key: K, value: V, expires_at: DateTime<Utc>, now: DateTime<Utc>) {
        self.entries.insert(key, (value, expires_at));
        self.writes += 1;
        if self.writes >= SWEEP_EVERY {
            self.sweep(now);
        }
    }

    /// Live value for `key`; an expired entry is removed and reported as absent.
    pub fn get(&mut self, key: &K, now: DateTime<Utc>) -> Option<&V> {
        let expired = matches!(self.entries.get(key), Some((_, at)) if *at <= now);
        if expired {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|(v, _)| v)
    }

    pub fn contains(&mut self, key: &K, now: DateTime<Utc>) -> bool {
        self.get(key, now).is_some()
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(v, _)| v)
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, (_, at)| *at > now);
        self.writes = 0;
        before - self.entries.len()
    }

    /// Number of stored entries, including ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// (destination, item id) pairs recently answered, shared by polling and direct replies.
#[derive(Debug)]
pub struct RecentIds {
    inner: Mutex<TtlCache<(GroupId, String)>>,
}

impl RecentIds {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(TtlCache::new(ttl)),
        }
    }

    pub fn contains_any(&self, group: GroupId, ids: &[String], now: DateTime<Utc>) -> bool {
        let mut cache = self.inner.lock().expect("recent ids mutex poisoned");
        ids.iter()
            .any(|id| cache.contains(&(group, id.clone()), now))
    }

    /// Record `ids` for `group` unless any of them is already present.
    /// Returns false when the reply should be suppressed. Check and insert
    /// happen under one lock, so two concurrent callers cannot both win.
    pub fn claim(&self, group: GroupId, ids: &[String], now: DateTime<Utc>) -> bool {
        let mut cache = self.inner.lock().expect("recent ids mutex poisoned");
        if ids
            .iter()
            .any(|id| cache.contains(&(group, id.clone()), now))
        {
            return false;
        }
        for id in ids {
            cache.insert((group, id.clone()), (), now);
        }
        true
    }

    /// Drop a claim whose delivery never happened.
    pub fn release(&self, group: GroupId, ids: &[String]) {
        let mut cache = self.inner.lock().expect("recent ids mutex poisoned");
        for id in ids {
            cache.remove(&(group, id.clone()));
        }
    }
}
