#![allow(dead_code)]

use {
    http_client_cache::cache::{loader::*, *},
    std::{
        io,
        sync::{Arc, atomic::*},
        time::*,
    },
    tracing_subscriber::{EnvFilter, fmt::fmt},
};

/// Initializes logs for the crate, once.
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("http_client_cache=debug"))
        .with_target(false)
        .with_test_writer()
        .try_init()
        .ok();
}

/// Loader returning `prefix1`, `prefix2`, ... that fails once it has succeeded `successes` times.
///
/// Every fetch takes `delay`.
pub fn counting_loader(
    prefix: &'static str,
    successes: usize,
    delay: Duration,
) -> (ConfiguredCacheLoader<String>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = calls.clone();
    let loader = ConfiguredCacheLoader::new(move |_key: String| {
        let calls = counter.clone();
        async move {
            tokio::time::sleep(delay).await;

            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call > successes {
                Err(io::Error::other("upstream unavailable"))
            } else {
                Ok(format!("{}{}", prefix, call))
            }
        }
    });

    (loader, calls)
}

/// Request with whole-second TTLs.
pub fn request(
    key: &str,
    loader: ConfiguredCacheLoader<String>,
    hard_ttl: u64,
    soft_ttl: u64,
) -> CacheLoadRequestBuilder<String> {
    CacheLoadRequest::builder(key, loader).ttl(Duration::from_secs(hard_ttl), Duration::from_secs(soft_ttl))
}

/// Waits until no reload is in flight for the key.
pub async fn reloaded<StorageT>(cache: &CacheBase<String, StorageT>, key: &str)
where
    StorageT: CacheStorage<String>,
{
    if let Some(scheduler) = cache.scheduler() {
        while scheduler.is_reloading(key) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Value of an entry.
pub fn value(entry: &CacheEntry<String>) -> Option<&str> {
    entry.value().map(String::as_str)
}
