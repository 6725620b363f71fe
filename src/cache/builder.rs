use super::{base::*, configuration::*, hooks::*, storage::*};

use std::{marker::*, sync::*};

//
// CacheBuilder
//

/// Builder for [CacheBase].
pub struct CacheBuilder<ValueT, StorageT> {
    storage: StorageT,
    cache_key: Option<CacheKeyHook>,
    scheduler: Option<SchedulerConfiguration>,
    value: PhantomData<fn() -> ValueT>,
}

impl<ValueT, StorageT> CacheBuilder<ValueT, StorageT>
where
    ValueT: 'static + Clone + Send + Sync,
    StorageT: CacheStorage<ValueT>,
{
    /// Constructor.
    pub fn new(storage: StorageT) -> Self {
        Self {
            storage,
            cache_key: None,
            scheduler: None,
            value: PhantomData,
        }
    }

    /// Provide a hook to transform user keys before the storage derives physical keys.
    ///
    /// [None] by default.
    pub fn cache_key(
        mut self,
        cache_key: impl Fn(CacheKeyHookContext) -> String + 'static + Send + Sync,
    ) -> Self {
        self.cache_key = Some(Arc::new(Box::new(cache_key)));
        self
    }

    /// Enable background loading and [schedule](CacheBase::schedule).
    ///
    /// Not enabled by default, in which case async loads run inline.
    pub fn scheduler(mut self, scheduler: SchedulerConfiguration) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Build.
    pub fn build(self) -> CacheBase<ValueT, StorageT> {
        CacheBase::new_with(self.storage, self.cache_key, self.scheduler)
    }
}
