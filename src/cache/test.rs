use super::{error::*, loader::*};

use {
    futures::future::*,
    std::{
        sync::{Arc, atomic::*},
        time::*,
    },
    tracing_subscriber::{EnvFilter, fmt::fmt},
};

/// Initializes logs for the crate, once.
pub(crate) fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("http_client_cache=debug"))
        .with_target(false)
        .with_test_writer()
        .try_init()
        .ok();
}

//
// CountingFetcher
//

/// Fetcher returning `prefix1`, `prefix2`, ... and counting its calls.
///
/// Fails once it has succeeded `successes` times.
#[derive(Clone)]
pub(crate) struct CountingFetcher {
    prefix: String,
    calls: Arc<AtomicUsize>,
    successes: usize,
    delay: Option<Duration>,
}

impl CountingFetcher {
    pub(crate) fn new(prefix: &str) -> (Self, Arc<AtomicUsize>) {
        Self::build(prefix, usize::MAX, None)
    }

    pub(crate) fn failing() -> (Self, Arc<AtomicUsize>) {
        Self::build("", 0, None)
    }

    fn build(prefix: &str, successes: usize, delay: Option<Duration>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = Self {
            prefix: prefix.into(),
            calls: calls.clone(),
            successes,
            delay,
        };
        (fetcher, calls)
    }
}

impl CacheFetcher<String> for CountingFetcher {
    fn fetch(&self, _key: &str) -> BoxFuture<'static, Result<String, BoxError>> {
        let fetcher = self.clone();
        async move {
            if let Some(delay) = fetcher.delay {
                tokio::time::sleep(delay).await;
            }

            let call = fetcher.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call > fetcher.successes {
                Err("upstream unavailable".into())
            } else {
                Ok(format!("{}{}", fetcher.prefix, call))
            }
        }
        .boxed()
    }
}

//
// CountingLoader
//

/// [ConfiguredCacheLoader] constructors over a [CountingFetcher].
pub(crate) struct CountingLoader;

impl CountingLoader {
    /// Returns `prefix1`, `prefix2`, ...
    pub(crate) fn sequence(prefix: &str) -> (ConfiguredCacheLoader<String>, Arc<AtomicUsize>) {
        Self::wrap(CountingFetcher::new(prefix))
    }

    /// Succeeds `successes` times, then fails.
    pub(crate) fn failing_after(prefix: &str, successes: usize) -> (ConfiguredCacheLoader<String>, Arc<AtomicUsize>) {
        Self::wrap(CountingFetcher::build(prefix, successes, None))
    }

    pub(crate) fn always_failing() -> (ConfiguredCacheLoader<String>, Arc<AtomicUsize>) {
        Self::wrap(CountingFetcher::failing())
    }

    /// Like [sequence](Self::sequence), taking `delay` for every call.
    pub(crate) fn slow(prefix: &str, delay: Duration) -> (ConfiguredCacheLoader<String>, Arc<AtomicUsize>) {
        Self::wrap(CountingFetcher::build(prefix, usize::MAX, Some(delay)))
    }

    fn wrap((fetcher, calls): (CountingFetcher, Arc<AtomicUsize>)) -> (ConfiguredCacheLoader<String>, Arc<AtomicUsize>) {
        (ConfiguredCacheLoader::new(fetcher), calls)
    }
}
