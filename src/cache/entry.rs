use super::error::*;

use {
    serde::{Deserialize, Serialize},
    std::time::*,
};

/// Shortest evict TTL accepted for writes.
pub const MIN_EVICT_TTL: Duration = Duration::from_secs(1);

//
// CacheEntry
//

/// Cached value with a stale TTL, an evict TTL, and the time it was stored.
///
/// Entries are snapshots: refreshing a key replaces its entry rather than mutating it, so a
/// caller holding an older entry simply holds an outdated value.
///
/// The stored-at time is stamped by [CacheBase](super::CacheBase) when the entry is written. An
/// entry that was never stored is both stale and evicted.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CacheEntry<ValueT> {
    value: Option<ValueT>,
    stored_at: Option<SystemTime>,
    evict_ttl: Duration,
    stale_ttl: Duration,
}

impl<ValueT> CacheEntry<ValueT> {
    /// Constructor.
    ///
    /// TTLs are truncated to whole seconds. Fails if the stale TTL exceeds the evict TTL.
    pub fn new(
        value: Option<ValueT>,
        evict_ttl: Duration,
        stale_ttl: Duration,
    ) -> Result<Self, SettingsError> {
        let evict_ttl = whole_seconds(evict_ttl);
        let stale_ttl = whole_seconds(stale_ttl);

        if stale_ttl > evict_ttl {
            return Err(SettingsError::StaleTtlExceedsEvictTtl {
                stale: stale_ttl,
                evict: evict_ttl,
            });
        }

        Ok(Self {
            value,
            stored_at: None,
            evict_ttl,
            stale_ttl,
        })
    }

    /// Constructor with a single TTL used for both staleness and eviction.
    pub fn with_ttl(value: ValueT, ttl: Duration) -> Self {
        let ttl = whole_seconds(ttl);
        Self {
            value: Some(value),
            stored_at: None,
            evict_ttl: ttl,
            stale_ttl: ttl,
        }
    }

    /// The "nothing usable yet" sentinel.
    ///
    /// Returned while a background load is in flight and there is no previous value to serve.
    pub fn empty() -> Self {
        Self {
            value: None,
            stored_at: None,
            evict_ttl: Duration::ZERO,
            stale_ttl: Duration::ZERO,
        }
    }

    /// True if this is the [empty](Self::empty) sentinel.
    pub fn is_empty_sentinel(&self) -> bool {
        self.value.is_none() && self.stored_at.is_none() && self.evict_ttl.is_zero()
    }

    /// Value.
    pub fn value(&self) -> Option<&ValueT> {
        self.value.as_ref()
    }

    /// Consume into the value.
    pub fn into_value(self) -> Option<ValueT> {
        self.value
    }

    /// When the entry was stored, if it was.
    pub fn stored_at(&self) -> Option<SystemTime> {
        self.stored_at
    }

    /// Evict (hard) TTL.
    pub fn evict_ttl(&self) -> Duration {
        self.evict_ttl
    }

    /// Stale (soft) TTL.
    pub fn stale_ttl(&self) -> Duration {
        self.stale_ttl
    }

    /// True once the stale TTL has elapsed since storage.
    pub fn is_stale(&self) -> bool {
        self.is_stale_at(SystemTime::now())
    }

    /// True once the evict TTL has elapsed since storage.
    pub fn is_evicted(&self) -> bool {
        self.is_evicted_at(SystemTime::now())
    }

    /// [is_stale](Self::is_stale) as of `now`.
    pub fn is_stale_at(&self, now: SystemTime) -> bool {
        elapsed(self.stored_at, self.stale_ttl, now)
    }

    /// [is_evicted](Self::is_evicted) as of `now`.
    pub fn is_evicted_at(&self, now: SystemTime) -> bool {
        elapsed(self.stored_at, self.evict_ttl, now)
    }

    /// Time left before eviction, as of `now`.
    ///
    /// [None] if the entry was never stored.
    pub fn time_to_evict_at(&self, now: SystemTime) -> Option<Duration> {
        let deadline = self.stored_at?.checked_add(self.evict_ttl)?;
        Some(deadline.duration_since(now).unwrap_or_default())
    }

    /// Clone stamped as stored at `now`.
    pub fn stamped(&self, now: SystemTime) -> Self
    where
        ValueT: Clone,
    {
        Self {
            value: self.value.clone(),
            stored_at: Some(now),
            evict_ttl: self.evict_ttl,
            stale_ttl: self.stale_ttl,
        }
    }

    /// Stamp as stored at `now`.
    pub fn into_stamped(mut self, now: SystemTime) -> Self {
        self.stored_at = Some(now);
        self
    }
}

fn elapsed(stored_at: Option<SystemTime>, ttl: Duration, now: SystemTime) -> bool {
    match stored_at.and_then(|stored_at| stored_at.checked_add(ttl)) {
        Some(deadline) => now >= deadline,
        None => true,
    }
}

/// Truncate to whole seconds.
pub fn whole_seconds(duration: Duration) -> Duration {
    Duration::from_secs(duration.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    const STALE: Duration = Duration::from_secs(10);
    const EVICT: Duration = Duration::from_secs(30);

    #[test]
    fn test_stale_ttl_must_not_exceed_evict_ttl() {
        assert!(CacheEntry::new(Some(1), EVICT, STALE).is_ok());
        assert!(CacheEntry::new(Some(1), EVICT, EVICT).is_ok());
        assert_eq!(
            CacheEntry::new(Some(1), STALE, EVICT),
            Err(SettingsError::StaleTtlExceedsEvictTtl {
                stale: EVICT,
                evict: STALE,
            })
        );
    }

    #[test]
    fn test_ttls_truncate_to_seconds() {
        let entry =
            CacheEntry::new(Some("a"), Duration::from_millis(2900), Duration::from_millis(1500))
                .unwrap();
        assert_eq!(entry.evict_ttl(), Duration::from_secs(2));
        assert_eq!(entry.stale_ttl(), Duration::from_secs(1));
    }

    #[test]
    fn test_staleness_progression() {
        let t0 = SystemTime::now();
        let entry = CacheEntry::new(Some("v"), EVICT, STALE)
            .unwrap()
            .into_stamped(t0);

        assert!(!entry.is_stale_at(t0));
        assert!(!entry.is_stale_at(t0 + STALE - Duration::from_millis(1)));

        assert!(entry.is_stale_at(t0 + STALE));
        assert!(!entry.is_evicted_at(t0 + STALE));
        assert!(!entry.is_evicted_at(t0 + EVICT - Duration::from_millis(1)));

        assert!(entry.is_stale_at(t0 + EVICT));
        assert!(entry.is_evicted_at(t0 + EVICT));

        assert_eq!(entry.time_to_evict_at(t0 + STALE), Some(EVICT - STALE));
        assert_eq!(entry.time_to_evict_at(t0 + EVICT * 2), Some(Duration::ZERO));
    }

    #[test]
    fn test_unstored_entry_is_stale_and_evicted() {
        let entry = CacheEntry::new(Some(1), EVICT, STALE).unwrap();
        assert!(entry.is_stale());
        assert!(entry.is_evicted());
        assert_eq!(entry.time_to_evict_at(SystemTime::now()), None);
    }

    #[test]
    fn test_empty_sentinel() {
        let empty = CacheEntry::<String>::empty();
        assert!(empty.is_empty_sentinel());
        assert!(empty.value().is_none());
        assert!(empty.is_stale());

        let stamped = CacheEntry::with_ttl("v".to_string(), EVICT).stamped(SystemTime::now());
        assert!(!stamped.is_empty_sentinel());
        assert!(!stamped.is_stale());
    }
}
