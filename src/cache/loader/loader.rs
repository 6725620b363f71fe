use super::super::{entry::*, error::*, settings::*};

use {
    futures::future::*,
    std::sync::*,
};

/// Common reference type for [CacheLoader].
pub type CacheLoaderRef<ValueT> = Arc<dyn CacheLoader<ValueT>>;

//
// LoadResult
//

/// What a [CacheLoader] produced.
#[derive(Clone, Debug)]
pub struct LoadResult<ValueT> {
    /// The entry to return to the caller.
    pub entry: CacheEntry<ValueT>,

    /// Whether the entry should be written to storage.
    pub cache_set: bool,
}

impl<ValueT> LoadResult<ValueT> {
    /// An entry to store and return.
    pub fn cached(entry: CacheEntry<ValueT>) -> Self {
        Self {
            entry,
            cache_set: true,
        }
    }

    /// An entry to return without storing.
    pub fn uncached(entry: CacheEntry<ValueT>) -> Self {
        Self {
            entry,
            cache_set: false,
        }
    }
}

//
// CacheLoader
//

/// Loads the value for a missing or stale key.
///
/// `is_async` is true when the load runs in the background on behalf of a caller that has
/// already been answered. `expired` is the stale entry being refreshed, if any.
///
/// Loaders are expected to turn fetch failures into a [LoadResult] or a [LoadError] themselves;
/// see [ConfiguredCacheLoader].
pub trait CacheLoader<ValueT>
where
    Self: 'static + Send + Sync,
{
    /// Load.
    fn load<'this>(
        &'this self,
        request: &'this CacheLoadRequest<ValueT>,
        is_async: bool,
        expired: Option<&'this CacheEntry<ValueT>>,
    ) -> BoxFuture<'this, Result<LoadResult<ValueT>, LoadError>>;
}

//
// CacheFetcher
//

/// The expensive underlying fetch: returns a value for a key or fails.
///
/// Implemented for async closures taking the key as a [String].
pub trait CacheFetcher<ValueT>
where
    Self: 'static + Send + Sync,
{
    /// Fetch.
    fn fetch(&self, key: &str) -> BoxFuture<'static, Result<ValueT, BoxError>>;
}

impl<FetchT, FutureT, ValueT, ErrorT> CacheFetcher<ValueT> for FetchT
where
    FetchT: Fn(String) -> FutureT + 'static + Send + Sync,
    FutureT: Future<Output = Result<ValueT, ErrorT>> + 'static + Send,
    ErrorT: Into<BoxError> + 'static,
{
    fn fetch(&self, key: &str) -> BoxFuture<'static, Result<ValueT, BoxError>> {
        self(key.into()).map_err(Into::into).boxed()
    }
}
