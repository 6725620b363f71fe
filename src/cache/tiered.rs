use super::{entry::*, error::*, storage::*};

//
// TieredStorage
//

/// Two-tiered [CacheStorage].
///
/// The assumption is that the first storage is faster than the next. Reads fall back to the next
/// tier on a miss. Writes, removals, and clearing apply to both.
///
/// Each tier derives its own physical key from the user key, so the tiered storage itself passes
/// user keys through unchanged.
///
/// For more tiers you can chain this type.
#[derive(Clone, Debug)]
pub struct TieredStorage<FirstStorageT, NextStorageT> {
    /// First storage.
    pub first: FirstStorageT,

    /// Next storage.
    pub next: NextStorageT,
}

impl<FirstStorageT, NextStorageT> TieredStorage<FirstStorageT, NextStorageT> {
    /// Constructor.
    pub fn new(first: FirstStorageT, next: NextStorageT) -> Self {
        Self { first, next }
    }
}

impl<ValueT, FirstStorageT, NextStorageT> CacheStorage<ValueT> for TieredStorage<FirstStorageT, NextStorageT>
where
    ValueT: 'static + Clone + Send + Sync,
    FirstStorageT: CacheStorage<ValueT>,
    NextStorageT: CacheStorage<ValueT>,
{
    async fn get(&self, key: &str) -> Result<Option<CacheEntry<ValueT>>, StorageError> {
        let first_key = self.first.cache_key(key).await?;
        match self.first.get(&first_key).await {
            Ok(Some(entry)) => return Ok(Some(entry)),
            Ok(None) => {}
            Err(error) => tracing::warn!(key, "first tier get failed: {}", error),
        }

        let next_key = self.next.cache_key(key).await?;
        self.next.get(&next_key).await
    }

    async fn set(&self, key: &str, entry: CacheEntry<ValueT>) -> Result<bool, StorageError> {
        let first_key = self.first.cache_key(key).await?;
        let first = self.first.set(&first_key, entry.clone()).await?;

        let next_key = self.next.cache_key(key).await?;
        let next = self.next.set(&next_key, entry).await?;

        Ok(first || next)
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let first_key = self.first.cache_key(key).await?;
        let first = self.first.remove(&first_key).await?;

        let next_key = self.next.cache_key(key).await?;
        let next = self.next.remove(&next_key).await?;

        Ok(first || next)
    }

    async fn remove_all(&self) -> Result<(), StorageError> {
        self.first.remove_all().await?;
        self.next.remove_all().await
    }

    async fn close(&self) {
        self.first.close().await;
        self.next.close().await
    }
}
