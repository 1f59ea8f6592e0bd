use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::db::GuildSettings;

const FALLBACK_CAPACITY: NonZeroUsize = match NonZeroUsize::new(100) {
    Some(cap) => cap,
    None => unreachable!(),
};

struct Entries {
    map: LruCache<u64, GuildSettings>,
    /// Bumped on every eviction so reads that started before a write can be discarded.
    generation: u64,
}

/// Per-guild settings memo. Writers evict, readers repopulate from the store.
#[derive(Clone)]
pub struct SettingsCache {
    cache: Arc<Mutex<Entries>>,
}

impl SettingsCache {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(FALLBACK_CAPACITY);
        Self {
            cache: Arc::new(Mutex::new(Entries {
                map: LruCache::new(cap),
                generation: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        // Entries can always be recomputed, so a poisoned map is still usable.
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, guild_id: u64) -> Option<GuildSettings> {
        self.lock().map.get(&guild_id).cloned()
    }

    pub fn insert(&self, settings: GuildSettings) {
        self.lock().map.put(settings.guild_id, settings);
    }

    /// Current write generation. Take it before reading from the store.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Caches `settings` only if nothing was evicted since `seen` was taken.
    pub fn insert_if_current(&self, settings: GuildSettings, seen: u64) -> bool {
        let mut entries = self.lock();
        if entries.generation != seen {
            return false;
        }
        entries.map.put(settings.guild_id, settings);
        true
    }

    /// Drops the entry for `guild_id`, returning whether one was present.
    pub fn evict(&self, guild_id: u64) -> bool {
        let mut entries = self.lock();
        entries.generation = entries.generation.wrapping_add(1);
        entries.map.pop(&guild_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(guild_id: u64, prefix: &str) -> GuildSettings {
        GuildSettings {
            prefix: Some(prefix.to_string()),
            ..GuildSettings::empty(guild_id)
        }
    }

    #[test]
    fn test_insert_get_evict() {
        let cache = SettingsCache::new(10);
        assert!(cache.get(1).is_none());

        cache.insert(settings(1, "?"));
        assert_eq!(cache.get(1).unwrap().prefix.as_deref(), Some("?"));

        // Newer value replaces the old one
        cache.insert(settings(1, "$"));
        assert_eq!(cache.get(1).unwrap().prefix.as_deref(), Some("$"));
        assert_eq!(cache.len(), 1);

        assert!(cache.evict(1));
        assert!(!cache.evict(1));
        assert!(cache.get(1).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_bound() {
        let cache = SettingsCache::new(2);
        cache.insert(settings(1, "a"));
        cache.insert(settings(2, "b"));
        cache.insert(settings(3, "c"));

        assert_eq!(cache.len(), 2);
        // Least recently used entry is the one dropped
        assert!(cache.get(1).is_none());
        assert!(cache.get(3).is_some());
    }

    #[test]
    fn test_zero_capacity_falls_back() {
        let cache = SettingsCache::new(0);
        cache.insert(settings(9, "!"));
        assert!(cache.get(9).is_some());
    }

    #[test]
    fn test_read_started_before_eviction_is_dropped() {
        let cache = SettingsCache::new(4);
        cache.insert(settings(1, "?"));

        // A reader snapshots the generation, then a writer evicts before the
        // reader gets its row back.
        let seen = cache.generation();
        cache.evict(1);
        assert!(!cache.insert_if_current(settings(1, "?"), seen));
        assert!(cache.get(1).is_none());

        let seen = cache.generation();
        assert!(cache.insert_if_current(settings(1, "$"), seen));
        assert_eq!(cache.get(1).unwrap().prefix.as_deref(), Some("$"));
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = SettingsCache::new(4);
        let other = cache.clone();
        cache.insert(settings(5, "~"));
        assert!(other.get(5).is_some());
        other.evict(5);
        assert!(cache.get(5).is_none());
    }
}
