use super::{
    super::super::{entry::*, error::*, storage::*},
    builder::*,
};

use std::{ops::*, sync::*};

/// Moka [CacheStorage].
///
/// Expiry is delegated to Moka, see [CacheEntryExpiry](super::CacheEntryExpiry).
pub type MokaStorage<ValueT> = Arc<moka::future::Cache<String, CacheEntry<ValueT>>>;

/// Moka [CacheStorage] with [CacheEntry] expiry and no capacity limit.
///
/// Use [ForCacheEntry] on your own builder for more control.
pub fn moka_storage<ValueT>() -> MokaStorage<ValueT>
where
    ValueT: 'static + Clone + Send + Sync,
{
    Arc::new(
        moka::future::Cache::<String, CacheEntry<ValueT>>::builder()
            .for_cache_entry()
            .build(),
    )
}

impl<ValueT> CacheStorage<ValueT> for MokaStorage<ValueT>
where
    ValueT: 'static + Clone + Send + Sync,
{
    async fn get(&self, key: &str) -> Result<Option<CacheEntry<ValueT>>, StorageError> {
        Ok(self.deref().get(key).await)
    }

    async fn set(&self, key: &str, entry: CacheEntry<ValueT>) -> Result<bool, StorageError> {
        self.deref().insert(key.into(), entry).await;
        Ok(true)
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.deref().remove(key).await.is_some())
    }

    async fn remove_all(&self) -> Result<(), StorageError> {
        self.deref().invalidate_all();
        Ok(())
    }
}
