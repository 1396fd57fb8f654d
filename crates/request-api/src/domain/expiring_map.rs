//! # Expiring Map
//!
//! Time-bounded registry of pending requests.
//!
//! ## Design
//!
//! - Every entry carries the timestamp of its creation
//! - An entry is evicted only once `now - created_at > retention`
//! - Nothing evicts on its own: callers sweep with [`ExpiringMap::remove_stale`]
//!
//! Updates to one key are serialised by the map's shard lock; different keys
//! proceed in parallel.

use crate::domain::error::ConfigError;
use crate::ports::outbound::{TimeSource, Timestamp};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

/// Shortest usable retention: timestamps have millisecond resolution.
pub const MIN_RETENTION: Duration = Duration::from_millis(1);

/// A stored value and its creation time.
struct Timestamped<V> {
    value: V,
    created_at: Timestamp,
}

/// Concurrent map whose entries expire after a fixed retention window.
pub struct ExpiringMap<K, V> {
    /// Map of key -> value and creation time.
    entries: DashMap<K, Timestamped<V>>,

    /// Retention window.
    retention: Duration,

    /// Clock used for creation times and staleness.
    time_source: Arc<dyn TimeSource>,
}

impl<K, V> ExpiringMap<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create a map retaining entries for `retention`.
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidRetention` - `retention` is under [`MIN_RETENTION`]
    pub fn new(retention: Duration, time_source: Arc<dyn TimeSource>) -> Result<Self, ConfigError> {
        if retention < MIN_RETENTION {
            return Err(ConfigError::InvalidRetention(format!(
                "retention {:?} is below the {:?} clock resolution",
                retention, MIN_RETENTION
            )));
        }

        Ok(Self {
            entries: DashMap::new(),
            retention,
            time_source,
        })
    }

    /// Insert the value produced by `supplier` unless `key` is present.
    ///
    /// An existing entry is left untouched, resolved or not. The supplier
    /// only runs when the entry is created.
    ///
    /// Returns `true` if an entry was created.
    pub fn insert_if_absent<F>(&self, key: K, supplier: F) -> bool
    where
        F: FnOnce() -> V,
    {
        match self.entries.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(Timestamped {
                    value: supplier(),
                    created_at: self.time_source.now(),
                });
                true
            }
        }
    }

    /// Apply `f` to the entry for `key` while holding its lock.
    ///
    /// Returns `f`'s result, or `None` without calling `f` when the key is
    /// absent. The creation time is not refreshed.
    pub fn compute_if_present<F, R>(&self, key: &K, f: F) -> Option<R>
    where
        F: FnOnce(&mut V) -> R,
    {
        self.entries
            .get_mut(key)
            .map(|mut entry| f(&mut entry.value))
    }

    /// Evict every entry older than the retention window.
    ///
    /// `on_evict` runs once per evicted entry, after the entry has left the
    /// map. Staleness is re-checked under the entry's lock, so an entry being
    /// updated concurrently is never evicted halfway through that update.
    ///
    /// Returns the number of evicted entries.
    pub fn remove_stale<F>(&self, mut on_evict: F) -> usize
    where
        F: FnMut(K, V),
    {
        let now = self.time_source.now();

        let candidates: Vec<K> = self
            .entries
            .iter()
            .filter(|entry| self.is_stale(entry.value(), now))
            .map(|entry| entry.key().clone())
            .collect();

        let mut evicted = 0;
        for key in candidates {
            if let Some((key, entry)) = self
                .entries
                .remove_if(&key, |_, entry| self.is_stale(entry, now))
            {
                on_evict(key, entry.value);
                evicted += 1;
            }
        }
        evicted
    }

    /// Check if a key has a live entry.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Get the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Retention window.
    #[must_use]
    pub fn retention(&self) -> Duration {
        self.retention
    }

    fn is_stale(&self, entry: &Timestamped<V>, now: Timestamp) -> bool {
        Duration::from_millis(now.saturating_sub(entry.created_at)) > self.retention
    }
}
