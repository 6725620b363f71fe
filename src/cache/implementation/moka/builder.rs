use super::{super::super::entry::*, expiry::*};

//
// ForCacheEntry
//

/// Add support for [CacheEntry] [Expiry](moka::Expiry).
pub trait ForCacheEntry
where
    Self: Sized,
{
    /// Add support for [CacheEntry] [Expiry](moka::Expiry).
    fn for_cache_entry(self) -> Self;
}

impl<ValueT> ForCacheEntry
    for moka::future::CacheBuilder<String, CacheEntry<ValueT>, moka::future::Cache<String, CacheEntry<ValueT>>>
where
    ValueT: 'static + Clone + Send + Sync,
{
    fn for_cache_entry(self) -> Self {
        self.expire_after(CacheEntryExpiry)
    }
}
