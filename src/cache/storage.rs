use super::{entry::*, error::*};

use std::future::*;

//
// CacheStorage
//

/// Storage backend for [CacheBase](super::CacheBase).
///
/// Keys are physical keys, already derived through [cache_key](CacheStorage::cache_key).
/// Entries arrive stamped with their stored-at time.
///
/// Implementations should ensure that cloning is cheap and clones always refer to the same shared
/// state.
///
/// Note that these are `async` functions written in longer form in order to include the `Send`
/// constraint. Implementations can simply use `async fn`.
#[allow(async_fn_in_trait)]
pub trait CacheStorage<ValueT>
where
    Self: 'static + Send + Sync,
{
    /// Get an entry.
    ///
    /// Entries past their evict TTL should not be returned.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<CacheEntry<ValueT>>, StorageError>> + Send;

    /// Store an entry, replacing any previous one.
    ///
    /// Returns whether it was stored.
    fn set(&self, key: &str, entry: CacheEntry<ValueT>) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// Remove an entry.
    ///
    /// Returns whether there was one.
    fn remove(&self, key: &str) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// Remove all entries.
    fn remove_all(&self) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Derive the physical key for a user key.
    ///
    /// The default is the user key itself.
    fn cache_key(&self, key: &str) -> impl Future<Output = Result<String, StorageError>> + Send {
        ready(Ok(key.into()))
    }

    /// Stop background work and release resources.
    ///
    /// The default does nothing.
    fn close(&self) -> impl Future<Output = ()> + Send {
        ready(())
    }
}
