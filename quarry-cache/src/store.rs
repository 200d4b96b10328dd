//! In-memory TTL store.

use crate::read::CacheRead;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    created_at: Instant,
    cached_at: DateTime<Utc>,
    ttl: Duration,
    /// `None` when `created_at + ttl` overflows; such entries never expire.
    expires_at: Option<Instant>,
    tags: BTreeSet<String>,
}

impl CacheEntry {
    fn new(value: Value, ttl: Duration, tags: BTreeSet<String>) -> Self {
        let created_at = Instant::now();
        Self {
            value,
            created_at,
            cached_at: Utc::now(),
            ttl,
            expires_at: created_at.checked_add(ttl),
            tags,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// TTL-keyed response store shared by every caller of one orchestrator.
///
/// Values are copied in on `set` and copied out on `get`; no caller ever holds
/// a reference into the map. Each operation locks a single shard, so a get,
/// set or invalidation is atomic with respect to the entries it touches.
#[derive(Debug)]
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    default_ttl: Duration,
}

impl ResponseCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Cached value for `key`, or `None` if absent or expired.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_read(key).map(CacheRead::into_value)
    }

    /// Like [`get`](Self::get), with the time the value was fetched.
    pub fn get_read(&self, key: &str) -> Option<CacheRead<Value>> {
        let now = Instant::now();
        match self.entries.get(key) {
            None => return None,
            Some(entry) if entry.is_live(now) => {
                return Some(CacheRead::from_cache(entry.value.clone(), entry.cached_at));
            }
            Some(_) => {}
        }

        // The shard guard is released above; evict unless a fresh set raced in.
        if self
            .entries
            .remove_if(key, |_, entry| !entry.is_live(now))
            .is_some()
        {
            tracing::trace!(key, "evicted expired cache entry");
        }
        None
    }

    /// Store `value` under `key` for `ttl`, or the default TTL.
    pub fn set(&self, key: impl Into<String>, value: Value, ttl: Option<Duration>) {
        self.set_tagged(key, value, ttl, std::iter::empty::<String>());
    }

    /// Store `value` with tags that [`invalidate_tag`](Self::invalidate_tag) can target.
    pub fn set_tagged<I, S>(&self, key: impl Into<String>, value: Value, ttl: Option<Duration>, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let tags = tags.into_iter().map(Into::into).collect();
        self.entries.insert(key.into(), CacheEntry::new(value, ttl, tags));
    }

    /// Remove the entry stored under exactly `key`.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Remove every entry whose key starts with `prefix`; `None` clears everything.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate(&self, prefix: Option<&str>) -> usize {
        let mut removed = 0;
        self.entries.retain(|key, _| {
            let keep = prefix.is_some_and(|prefix| !key.starts_with(prefix));
            if !keep {
                removed += 1;
            }
            keep
        });
        tracing::debug!(prefix = prefix.unwrap_or("*"), removed, "cache invalidated");
        removed
    }

    /// Remove every entry carrying `tag`. Returns the number removed.
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.tags.contains(tag);
            if !keep {
                removed += 1;
            }
            keep
        });
        tracing::debug!(tag, removed, "cache tag invalidated");
        removed
    }

    /// Drop expired entries. Optional hygiene; reads already ignore them.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = entry.is_live(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Age and TTL of a live entry, for diagnostics.
    pub fn entry_age(&self, key: &str) -> Option<(Duration, Duration)> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| (now.saturating_duration_since(e.created_at), e.ttl))
    }
}
