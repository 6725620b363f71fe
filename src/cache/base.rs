use super::{
    builder::*, configuration::*, entry::*, error::*, hooks::*, loader::*, scheduler::*, settings::*,
    storage::*,
};

use {
    duration_str::*,
    futures::future::*,
    std::{
        sync::{Arc, Weak},
        time::*,
    },
};

//
// CacheBase
//

/// Cache with soft and hard TTLs on top of a [CacheStorage].
///
/// Values are read through [get_or_load](Self::get_or_load): a fresh hit is returned as is, while
/// a stale hit or a miss is loaded with the request's [CacheLoader], either inline or in the
/// background via the [Scheduler], as the request's [LoadingSettings] say.
///
/// Storage failures never reach the caller. They are logged and treated as a miss (or `false`).
///
/// Cloning is cheap and clones share the same state.
pub struct CacheBase<ValueT, StorageT> {
    inner: Arc<CacheInner<ValueT, StorageT>>,
}

struct CacheInner<ValueT, StorageT> {
    storage: StorageT,
    cache_key: Option<CacheKeyHook>,
    scheduler: Option<Scheduler<ValueT>>,
}

impl<ValueT, StorageT> CacheBase<ValueT, StorageT>
where
    ValueT: 'static + Clone + Send + Sync,
    StorageT: CacheStorage<ValueT>,
{
    /// Constructor without a scheduler or key hook.
    ///
    /// See [builder](Self::builder) for more options.
    pub fn new(storage: StorageT) -> Self {
        Self::builder(storage).build()
    }

    /// Builder.
    pub fn builder(storage: StorageT) -> CacheBuilder<ValueT, StorageT> {
        CacheBuilder::new(storage)
    }

    pub(crate) fn new_with(
        storage: StorageT,
        cache_key: Option<CacheKeyHook>,
        scheduler: Option<SchedulerConfiguration>,
    ) -> Self {
        let inner = Arc::new_cyclic(|inner: &Weak<CacheInner<ValueT, StorageT>>| {
            let scheduler = scheduler.map(|configuration| {
                let reloader: Weak<dyn Reloader<ValueT>> = inner.clone();
                Scheduler::new(configuration, reloader)
            });

            CacheInner {
                storage,
                cache_key,
                scheduler,
            }
        });

        Self { inner }
    }

    /// Storage.
    pub fn storage(&self) -> &StorageT {
        &self.inner.storage
    }

    /// Scheduler, if configured.
    pub fn scheduler(&self) -> Option<&Scheduler<ValueT>> {
        self.inner.scheduler.as_ref()
    }

    /// Get an entry.
    ///
    /// Entries past their evict TTL are treated as a miss.
    pub async fn get(&self, key: &str) -> Option<CacheEntry<ValueT>> {
        self.inner.get(key).await
    }

    /// Store an entry.
    ///
    /// The stored copy is stamped with the current time; `entry` itself is left as is. Returns
    /// whether it was stored.
    pub async fn set(&self, key: &str, entry: &CacheEntry<ValueT>) -> bool {
        self.inner.write(key, entry.stamped(SystemTime::now())).await
    }

    /// Store a value with a single TTL used for both staleness and eviction.
    ///
    /// Returns whether it was stored.
    pub async fn set_value(&self, key: &str, value: ValueT, ttl: Duration) -> bool {
        let entry = CacheEntry::with_ttl(value, ttl).into_stamped(SystemTime::now());
        self.inner.write(key, entry).await
    }

    /// Remove an entry.
    ///
    /// Returns whether there was one.
    pub async fn remove(&self, key: &str) -> bool {
        self.inner.remove(key).await
    }

    /// Remove all entries.
    ///
    /// Returns whether the storage succeeded.
    pub async fn remove_all(&self) -> bool {
        match self.inner.storage.remove_all().await {
            Ok(()) => {
                tracing::debug!("removed all");
                true
            }

            Err(error) => {
                tracing::warn!("remove all failed: {}", error);
                false
            }
        }
    }

    /// Get the entry for a request, loading it if it is missing or stale.
    ///
    /// With async loading the caller gets the stale entry, or [CacheEntry::empty] on a miss, while
    /// the load runs in the background. Without a scheduler, async loads run inline.
    pub async fn get_or_load(&self, request: &CacheLoadRequest<ValueT>) -> Result<CacheEntry<ValueT>, LoadError> {
        let key = request.key();

        match self.inner.get(key).await {
            Some(entry) => {
                if !entry.is_stale() {
                    return Ok(entry);
                }

                if request.loading.expired_load_async && self.inner.submit(request, Some(&entry)) {
                    return Ok(entry);
                }

                self.inner.load_with(false, request, Some(&entry), None).await
            }

            None => {
                if request.loading.missing_load_async && self.inner.submit(request, None) {
                    return Ok(CacheEntry::empty());
                }

                self.inner.load_with(false, request, None, None).await
            }
        }
    }

    /// Load inline, regardless of what is cached, and store the result.
    ///
    /// `expired` is handed to the loader as the previous entry.
    pub async fn load(
        &self,
        request: &CacheLoadRequest<ValueT>,
        expired: Option<&CacheEntry<ValueT>>,
    ) -> Result<CacheEntry<ValueT>, LoadError> {
        self.inner.load_with(false, request, expired, None).await
    }

    /// Refresh a request periodically in the background.
    ///
    /// It is reloaded whenever its soft TTL has elapsed since its last successful refresh,
    /// starting right away.
    pub fn schedule(&self, request: &CacheLoadRequest<ValueT>) -> Result<(), ScheduleError> {
        self.inner
            .scheduler
            .as_ref()
            .ok_or(ScheduleError::NoScheduler)?
            .schedule(request)
    }

    /// Stop refreshing a request.
    ///
    /// Returns whether it was scheduled.
    pub fn unschedule(&self, key: &str) -> bool {
        match &self.inner.scheduler {
            Some(scheduler) => scheduler.unschedule(key),
            None => false,
        }
    }

    /// Stop the scheduler's sweep and the storage's background work.
    ///
    /// Reloads already in flight run to completion.
    pub async fn close(&self) {
        if let Some(scheduler) = &self.inner.scheduler {
            scheduler.close().await;
        }

        self.inner.storage.close().await;
    }
}

impl<ValueT, StorageT> Clone for CacheBase<ValueT, StorageT> {
    fn clone(&self) -> Self {
        // #[derive(Clone)] would require ValueT: Clone and StorageT: Clone
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<ValueT, StorageT> CacheInner<ValueT, StorageT>
where
    ValueT: 'static + Clone + Send + Sync,
    StorageT: CacheStorage<ValueT>,
{
    async fn physical_key(&self, key: &str) -> Option<String> {
        if let Err(error) = validate_key(key) {
            tracing::warn!("{}", error);
            return None;
        }

        let key = match &self.cache_key {
            Some(cache_key) => cache_key(CacheKeyHookContext::new(key)),
            None => key.into(),
        };

        match self.storage.cache_key(&key).await {
            Ok(physical_key) => Some(physical_key),

            Err(error) => {
                tracing::warn!(key = %key, "cache key failed: {}", error);
                None
            }
        }
    }

    async fn get(&self, key: &str) -> Option<CacheEntry<ValueT>> {
        let physical_key = self.physical_key(key).await?;

        match self.storage.get(&physical_key).await {
            Ok(Some(entry)) => {
                if entry.is_evicted() {
                    tracing::warn!(key, "storage returned an evicted entry, treating as a miss");
                    None
                } else {
                    tracing::debug!(key, stale = entry.is_stale(), "hit");
                    Some(entry)
                }
            }

            Ok(None) => {
                tracing::debug!(key, "miss");
                None
            }

            Err(error) => {
                tracing::warn!(key, "get failed: {}", error);
                None
            }
        }
    }

    // The entry must already be stamped
    async fn write(&self, key: &str, entry: CacheEntry<ValueT>) -> bool {
        if entry.evict_ttl() < MIN_EVICT_TTL {
            tracing::warn!(
                key,
                "not storing, evict TTL is shorter than {}: {}",
                MIN_EVICT_TTL.human_format(),
                entry.evict_ttl().human_format()
            );
            return false;
        }

        let Some(physical_key) = self.physical_key(key).await else {
            return false;
        };

        let evict_ttl = entry.evict_ttl();
        match self.storage.set(&physical_key, entry).await {
            Ok(stored) => {
                tracing::debug!(key, stored, "set for {}", evict_ttl.human_format());
                stored
            }

            Err(error) => {
                tracing::warn!(key, "set failed: {}", error);
                false
            }
        }
    }

    async fn remove(&self, key: &str) -> bool {
        let Some(physical_key) = self.physical_key(key).await else {
            return false;
        };

        match self.storage.remove(&physical_key).await {
            Ok(removed) => removed,

            Err(error) => {
                tracing::warn!(key, "remove failed: {}", error);
                false
            }
        }
    }

    // Returns false if the caller should load inline
    fn submit(&self, request: &CacheLoadRequest<ValueT>, expired: Option<&CacheEntry<ValueT>>) -> bool {
        let key = request.key();

        let Some(scheduler) = &self.scheduler else {
            tracing::warn!(key, "async load requested but there is no scheduler, loading inline");
            return false;
        };

        if let Err(error) = scheduler.start_reload(request, expired.cloned()) {
            // The key has been released, so the next access will try again
            tracing::warn!(key, "could not start background load: {}", error);
        }

        true
    }

    async fn load_with(
        &self,
        is_async: bool,
        request: &CacheLoadRequest<ValueT>,
        expired: Option<&CacheEntry<ValueT>>,
        last_refresh: Option<&LastRefresh>,
    ) -> Result<CacheEntry<ValueT>, LoadError> {
        let key = request.key();
        tracing::debug!(key, is_async, expired = expired.is_some(), "loading");

        let LoadResult { entry, cache_set } = request.loader().load(request, is_async, expired).await?;

        let entry = if cache_set {
            let entry = entry.into_stamped(SystemTime::now());
            if !self.write(key, entry.clone()).await {
                tracing::warn!(key, "loaded entry was not stored");
            }
            entry
        } else {
            entry
        };

        if let Some(last_refresh) = last_refresh {
            last_refresh.touch();
        }

        Ok(entry)
    }
}

impl<ValueT, StorageT> Reloader<ValueT> for CacheInner<ValueT, StorageT>
where
    ValueT: 'static + Clone + Send + Sync,
    StorageT: CacheStorage<ValueT>,
{
    fn reload(
        &self,
        request: CacheLoadRequest<ValueT>,
        expired: Option<CacheEntry<ValueT>>,
        last_refresh: Option<Arc<LastRefresh>>,
    ) -> BoxFuture<'_, ()> {
        async move {
            let key = request.key();

            // Scheduled reloads don't know what is cached
            let expired = match expired {
                Some(expired) => Some(expired),
                None if last_refresh.is_some() => self.get(key).await,
                None => None,
            };

            if let Err(error) = self
                .load_with(true, &request, expired.as_ref(), last_refresh.as_deref())
                .await
            {
                tracing::warn!(key, "background load failed: {}", error_chain(&error));
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        super::{implementation::memory::*, test::*},
        *,
    };

    use std::sync::atomic::*;

    fn cache() -> CacheBase<String, MemoryStorage<String>> {
        CacheBase::new(MemoryStorage::default())
    }

    #[tokio::test]
    async fn test_set_get_remove() {
        setup();
        let cache = cache();

        assert!(cache.set_value("k", "v".into(), Duration::from_secs(10)).await);
        let entry = cache.get("k").await.unwrap();
        assert_eq!(entry.value().map(String::as_str), Some("v"));
        assert!(!entry.is_stale());

        assert!(cache.remove("k").await);
        assert!(!cache.remove("k").await);
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_set_does_not_stamp_the_callers_entry() {
        setup();
        let cache = cache();
        let entry = CacheEntry::with_ttl("v".to_string(), Duration::from_secs(10));

        assert!(cache.set("k", &entry).await);
        assert!(entry.stored_at().is_none());
        assert!(cache.get("k").await.unwrap().stored_at().is_some());
    }

    #[tokio::test]
    async fn test_rejects_blank_keys_and_short_ttls() {
        setup();
        let cache = cache();

        assert!(!cache.set_value(" ", "v".into(), Duration::from_secs(10)).await);
        assert!(cache.get("").await.is_none());
        assert!(!cache.remove("\t").await);
        assert!(!cache.set_value("k", "v".into(), Duration::from_millis(900)).await);
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_key_hook() {
        setup();
        let storage = MemoryStorage::<String>::default();
        let cache = CacheBase::builder(storage.clone())
            .cache_key(|context| format!("tenant:{}", context.key))
            .build();

        assert!(cache.set_value("k", "v".to_string(), Duration::from_secs(10)).await);
        assert!(storage.contains("tenant:k"));
        assert!(!storage.contains("k"));
        assert!(cache.get("k").await.is_some());
    }

    #[tokio::test]
    async fn test_get_or_load_fresh_hit_skips_loader() {
        setup();
        let cache = cache();
        let (loader, calls) = CountingLoader::sequence("v");
        let request = CacheLoadRequest::builder("k", loader)
            .ttl(Duration::from_secs(20), Duration::from_secs(10))
            .build()
            .unwrap();

        let first = cache.get_or_load(&request).await.unwrap();
        let second = cache.get_or_load(&request).await.unwrap();

        assert_eq!(first.value().map(String::as_str), Some("v1"));
        assert_eq!(second.value().map(String::as_str), Some("v1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sync_missing_failure_is_typed() {
        setup();
        let cache = cache();
        let (loader, _) = CountingLoader::always_failing();
        let request = CacheLoadRequest::builder("k", loader).build().unwrap();

        match cache.get_or_load(&request).await {
            Err(LoadError::Failed { settings, .. }) => assert_eq!(settings.key(), "k"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_async_without_scheduler_loads_inline() {
        setup();
        let cache = cache();
        let (loader, calls) = CountingLoader::sequence("v");
        let request = CacheLoadRequest::builder("k", loader)
            .missing_load_async(true)
            .build()
            .unwrap();

        let entry = cache.get_or_load(&request).await.unwrap();
        assert_eq!(entry.value().map(String::as_str), Some("v1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_schedule_without_scheduler() {
        setup();
        let cache = cache();
        let (loader, _) = CountingLoader::sequence("v");
        let request = CacheLoadRequest::builder("k", loader).build().unwrap();

        assert_eq!(cache.schedule(&request), Err(ScheduleError::NoScheduler));
        assert!(!cache.unschedule("k"));
    }

    #[tokio::test]
    async fn test_uncached_load_result_is_returned_but_not_stored() {
        setup();
        let cache = cache();
        let (loader, _) = CountingLoader::always_failing();
        let loader = loader.on_missing(MissingFailureRecipe {
            logging: FailureLogging::None,
            value: MissingFailureValue::Null,
            caching: FailureCaching::None,
        });
        let request = CacheLoadRequest::builder("k", loader).build().unwrap();

        let entry = cache.get_or_load(&request).await.unwrap();
        assert!(entry.value().is_none());
        assert!(cache.get("k").await.is_none());
    }

    // Fails every operation, or serves entries that are already evicted
    struct BrokenStorage {
        evicted: bool,
    }

    impl CacheStorage<String> for BrokenStorage {
        async fn get(&self, _key: &str) -> Result<Option<CacheEntry<String>>, StorageError> {
            if self.evicted {
                let entry = CacheEntry::with_ttl("old".to_string(), Duration::from_secs(10)).into_stamped(UNIX_EPOCH);
                Ok(Some(entry))
            } else {
                Err(StorageError::Closed)
            }
        }

        async fn set(&self, _key: &str, _entry: CacheEntry<String>) -> Result<bool, StorageError> {
            Err(StorageError::Timeout(Duration::from_secs(1)))
        }

        async fn remove(&self, _key: &str) -> Result<bool, StorageError> {
            Err(StorageError::Closed)
        }

        async fn remove_all(&self) -> Result<(), StorageError> {
            Err(StorageError::Client("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_storage_failures_are_contained() {
        setup();
        let cache = CacheBase::new(BrokenStorage { evicted: false });

        assert!(cache.get("k").await.is_none());
        assert!(!cache.set_value("k", "v".to_string(), Duration::from_secs(10)).await);
        assert!(!cache.remove("k").await);
        assert!(!cache.remove_all().await);
    }

    #[tokio::test]
    async fn test_storage_failures_do_not_fail_loads() {
        setup();
        let cache = CacheBase::new(BrokenStorage { evicted: false });
        let (loader, calls) = CountingLoader::sequence("v");
        let request = CacheLoadRequest::builder("k", loader).build().unwrap();

        let entry = cache.get_or_load(&request).await.unwrap();
        assert_eq!(entry.value().map(String::as_str), Some("v1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_evicted_entry_from_storage_is_a_miss() {
        setup();
        let cache = CacheBase::new(BrokenStorage { evicted: true });
        assert!(cache.get("k").await.is_none());

        let (loader, calls) = CountingLoader::sequence("v");
        let request = CacheLoadRequest::builder("k", loader).build().unwrap();

        // Loaded as a miss, so the evicted value is not handed to the loader
        let entry = cache.get_or_load(&request).await.unwrap();
        assert_eq!(entry.value().map(String::as_str), Some("v1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    fn scheduled_cache() -> CacheBase<String, MemoryStorage<String>> {
        CacheBase::builder(MemoryStorage::default())
            .scheduler(Default::default())
            .build()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_async_misses_load_once() {
        setup();
        let cache = scheduled_cache();
        let (loader, calls) = CountingLoader::slow("v", Duration::from_millis(200));
        let request = CacheLoadRequest::builder("k", loader)
            .missing_load_async(true)
            .build()
            .unwrap();

        let results = join_all((0..10).map(|_| cache.get_or_load(&request))).await;
        for result in results {
            assert!(result.unwrap().is_empty_sentinel());
        }

        while cache.scheduler().unwrap().is_reloading("k") {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let entry = cache.get_or_load(&request).await.unwrap();
        assert_eq!(entry.value().map(String::as_str), Some("v1"));
        assert!(!entry.is_stale());

        cache.close().await;
    }

    #[tokio::test]
    async fn test_explicit_load_passes_previous_entry() {
        setup();
        let cache = cache();
        let (loader, calls) = CountingLoader::failing_after("v", 1);
        let request = CacheLoadRequest::builder("k", loader)
            .ttl(Duration::from_secs(20), Duration::from_secs(10))
            .build()
            .unwrap();

        let first = cache.load(&request, None).await.unwrap();
        assert_eq!(first.value().map(String::as_str), Some("v1"));

        // The refresh fails and the previous value is kept, stored as already stale
        let second = cache.load(&request, Some(&first)).await.unwrap();
        assert_eq!(second.value().map(String::as_str), Some("v1"));
        assert!(second.is_stale());
        assert!(cache.get("k").await.unwrap().is_stale());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rejected_submission_serves_what_is_cached() {
        setup();
        let cache = CacheBase::builder(MemoryStorage::default())
            .scheduler(SchedulerConfiguration {
                max_concurrent_reloads: 1,
                ..Default::default()
            })
            .build();
        let scheduler = cache.scheduler().unwrap();

        // Take the only permit
        let (busy, _) = CountingLoader::slow("busy", Duration::from_millis(500));
        let busy = CacheLoadRequest::builder("busy", busy).build().unwrap();
        assert!(scheduler.start_reload(&busy, None).unwrap());

        let stale = CacheEntry::new(Some("old".to_string()), Duration::from_secs(10), Duration::ZERO).unwrap();
        assert!(cache.set("k", &stale).await);

        let (loader, calls) = CountingLoader::sequence("v");
        let request = CacheLoadRequest::builder("k", loader)
            .expired_load_async(true)
            .missing_load_async(true)
            .build()
            .unwrap();

        let entry = cache.get_or_load(&request).await.unwrap();
        assert_eq!(entry.value().map(String::as_str), Some("old"));
        assert!(entry.is_stale());
        assert!(!scheduler.is_reloading("k"));

        let missing = CacheLoadRequestBuilder::new("missing", request.loader().clone())
            .missing_load_async(true)
            .build()
            .unwrap();
        assert!(cache.get_or_load(&missing).await.unwrap().is_empty_sentinel());
        assert!(!scheduler.is_reloading("missing"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        while scheduler.is_reloading("busy") {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // The next access gets through
        assert_eq!(cache.get_or_load(&request).await.unwrap().value().map(String::as_str), Some("old"));
        while scheduler.is_reloading("k") || calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(cache.get("k").await.unwrap().value().map(String::as_str), Some("v1"));

        cache.close().await;
    }
}
