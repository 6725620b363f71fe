use super::super::super::entry::*;

use {duration_str::*, moka::*, std::time::*};

//
// CacheEntryExpiry
//

/// Moka [Expiry] for [CacheEntry].
///
/// Entries expire when their evict TTL has elapsed since they were stored. Moka's own clock only
/// starts when the entry is inserted, so the time already spent since storing is subtracted.
pub struct CacheEntryExpiry;

impl CacheEntryExpiry {
    fn expire<ValueT>(&self, key: &str, entry: &CacheEntry<ValueT>) -> Option<Duration> {
        let duration = entry.time_to_evict_at(SystemTime::now()).unwrap_or(entry.evict_ttl());
        tracing::debug!(key, "expiring in {}", duration.human_format());
        Some(duration)
    }
}

impl<ValueT> Expiry<String, CacheEntry<ValueT>> for CacheEntryExpiry {
    fn expire_after_create(&self, key: &String, entry: &CacheEntry<ValueT>, _created_at: Instant) -> Option<Duration> {
        self.expire(key, entry)
    }

    fn expire_after_update(
        &self,
        key: &String,
        entry: &CacheEntry<ValueT>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        // A replaced entry brings its own TTL
        self.expire(key, entry)
    }
}
