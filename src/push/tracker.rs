// src/push/tracker.rs
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use super::cache::TtlCache;
use crate::feed::types::{LiveStatus, Uid};

/// Outcome of one successful fetch for one watched key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// Zero items where that cannot be right; nothing was recorded.
    Anomaly,
    /// First poll of this key (or its bookkeeping expired); items recorded, nothing delivered.
    FirstSeen,
    /// Ids not seen before, in fetch order. May be empty.
    New(Vec<String>),
}

/// Seen-ID cache plus first-observation flags for one feed kind.
#[derive(Debug)]
pub struct NewItemTracker {
    seen: TtlCache<(String, String)>,
    first: TtlCache<String>,
    empty_is_anomaly: bool,
}

impl NewItemTracker {
    pub fn new(empty_is_anomaly: bool) -> Self {
        // Every write passes its own TTL; the default is never used.
        Self {
            seen: TtlCache::new(Duration::from_secs(3600)),
            first: TtlCache::new(Duration::from_secs(3600)),
            empty_is_anomaly,
        }
    }

    /// Record a fetched batch for `scope` and say what is deliverable.
    ///
    /// All fetched ids are written to the seen cache whether or not this is the
    /// first observation. The first-observation flag is refreshed on every
    /// successful poll, so it only lapses for keys that stop being polled.
    pub fn observe(
        &mut self,
        scope: &str,
        ids: &[String],
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Observation {
        if ids.is_empty() && self.empty_is_anomaly {
            return Observation::Anomaly;
        }

        let mut batch = HashSet::new();
        let mut fresh = Vec::new();
        for id in ids {
            let key = (scope.to_string(), id.clone());
            if batch.insert(id.as_str()) && !self.seen.contains(&key, now) {
                fresh.push(id.clone());
            }
        }
        for id in ids {
            self.seen
                .insert_with_ttl((scope.to_string(), id.clone()), (), ttl, now);
        }

        let key = scope.to_string();
        let first = !self.first.contains(&key, now);
        self.first.insert_with_ttl(key, (), ttl, now);

        if first {
            Observation::FirstSeen
        } else {
            Observation::New(fresh)
        }
    }

    pub fn is_registered(&mut self, scope: &str, now: DateTime<Utc>) -> bool {
        self.first.contains(&scope.to_string(), now)
    }

    pub fn has_seen(&mut self, scope: &str, id: &str, now: DateTime<Utc>) -> bool {
        self.seen
            .contains(&(scope.to_string(), id.to_string()), now)
    }
}

/// Last known live status per uid, for edge-triggered live notices.
#[derive(Debug, Default)]
pub struct LiveTracker {
    last: HashMap<Uid, LiveStatus>,
    /// Uids of the current routing table; `None` until the first `watch`.
    watched: Option<HashSet<Uid>>,
}

impl LiveTracker {
    /// Store `status` and report whether this is a transition into live.
    /// Uids outside the watched set are neither stored nor reported.
    pub fn transition(&mut self, uid: Uid, status: LiveStatus) -> bool {
        if self.watched.as_ref().is_some_and(|w| !w.contains(&uid)) {
            return false;
        }
        let prev = self.last.insert(uid, status).unwrap_or(LiveStatus::Unknown);
        status == LiveStatus::Live && prev != LiveStatus::Live
    }

    pub fn status(&self, uid: Uid) -> LiveStatus {
        self.last.get(&uid).copied().unwrap_or(LiveStatus::Unknown)
    }

    /// Replace the watched set and forget every uid outside it.
    pub fn watch<I: IntoIterator<Item = Uid>>(&mut self, uids: I) {
        let watched: HashSet<Uid> = uids.into_iter().collect();
        self.last.retain(|uid, _| watched.contains(uid));
        self.watched = Some(watched);
    }

    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}
