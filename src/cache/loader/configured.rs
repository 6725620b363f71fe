use super::{
    super::{entry::*, error::*, settings::*},
    loader::*,
};

use {
    futures::future::*,
    std::{sync::*, time::*},
};

//
// FailureLogging
//

/// How a failed fetch is logged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailureLogging {
    /// Don't log.
    None,

    /// Warn with the error message.
    #[default]
    Message,

    /// Error with the whole `source()` chain.
    Full,
}

//
// FailureCaching
//

/// Whether and how the outcome of a failed fetch is stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailureCaching {
    /// Don't store anything.
    #[default]
    None,

    /// Store as already stale (with the request's hard TTL), so the next access retries.
    Stale,

    /// Store with the request's TTLs, as if freshly loaded.
    RequestTtl,
}

//
// MissingFailureValue
//

/// What a failed load of a missing key returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissingFailureValue {
    /// A [LoadError].
    #[default]
    Fail,

    /// An entry without a value.
    Null,
}

//
// ExpiredFailureValue
//

/// What a failed refresh of a stale key returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExpiredFailureValue {
    /// A [LoadError].
    Fail,

    /// An entry without a value.
    Null,

    /// The previous value.
    #[default]
    Expired,
}

//
// MissingFailureRecipe
//

/// Recovery for a failed load of a missing key.
///
/// The default logs the message and fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MissingFailureRecipe {
    /// Logging.
    pub logging: FailureLogging,

    /// Returned value.
    pub value: MissingFailureValue,

    /// Caching of the returned value. Ignored for [MissingFailureValue::Fail].
    pub caching: FailureCaching,
}

//
// ExpiredFailureRecipe
//

/// Recovery for a failed refresh of a stale key.
///
/// The default logs the message and keeps serving the previous value, storing it again as
/// already stale so that the key doesn't drop out of the cache while the upstream is failing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpiredFailureRecipe {
    /// Logging.
    pub logging: FailureLogging,

    /// Returned value.
    pub value: ExpiredFailureValue,

    /// Caching of the returned value. Ignored for [ExpiredFailureValue::Fail].
    pub caching: FailureCaching,
}

impl Default for ExpiredFailureRecipe {
    fn default() -> Self {
        Self {
            logging: FailureLogging::Message,
            value: ExpiredFailureValue::Expired,
            caching: FailureCaching::Stale,
        }
    }
}

//
// ConfiguredCacheLoader
//

/// [CacheLoader] that wraps a [CacheFetcher] with failure recipes.
///
/// A successful fetch is stored with the request's TTLs. A failed fetch is handled by the
/// [MissingFailureRecipe] when there was no previous entry and by the [ExpiredFailureRecipe] when
/// a stale entry was being refreshed.
pub struct ConfiguredCacheLoader<ValueT> {
    fetcher: Arc<dyn CacheFetcher<ValueT>>,
    on_missing: MissingFailureRecipe,
    on_expired: ExpiredFailureRecipe,
}

impl<ValueT> ConfiguredCacheLoader<ValueT> {
    /// Constructor.
    pub fn new<FetcherT>(fetcher: FetcherT) -> Self
    where
        FetcherT: CacheFetcher<ValueT>,
    {
        Self {
            fetcher: Arc::new(fetcher),
            on_missing: Default::default(),
            on_expired: Default::default(),
        }
    }

    /// Recipe for a failed load of a missing key.
    ///
    /// The default is [MissingFailureRecipe::default].
    pub fn on_missing(mut self, recipe: MissingFailureRecipe) -> Self {
        self.on_missing = recipe;
        self
    }

    /// Recipe for a failed refresh of a stale key.
    ///
    /// The default is [ExpiredFailureRecipe::default].
    pub fn on_expired(mut self, recipe: ExpiredFailureRecipe) -> Self {
        self.on_expired = recipe;
        self
    }

    fn missing_failure(
        &self,
        settings: &CachingSettings,
        is_async: bool,
        error: BoxError,
    ) -> Result<LoadResult<ValueT>, LoadError> {
        let recipe = &self.on_missing;
        log_failure(recipe.logging, settings, is_async, "missing", &error);

        match recipe.value {
            MissingFailureValue::Fail => Err(LoadError::failed(settings.clone(), error)),
            MissingFailureValue::Null => recover(recipe.caching, settings, None),
        }
    }

    fn expired_failure(
        &self,
        settings: &CachingSettings,
        is_async: bool,
        expired: &CacheEntry<ValueT>,
        error: BoxError,
    ) -> Result<LoadResult<ValueT>, LoadError>
    where
        ValueT: Clone,
    {
        let recipe = &self.on_expired;
        log_failure(recipe.logging, settings, is_async, "expired", &error);

        match recipe.value {
            ExpiredFailureValue::Fail => Err(LoadError::failed(settings.clone(), error)),
            ExpiredFailureValue::Null => recover(recipe.caching, settings, None),
            ExpiredFailureValue::Expired => match recipe.caching {
                // Hand back the previous entry as it was
                FailureCaching::None => Ok(LoadResult::uncached(expired.clone())),
                caching => recover(caching, settings, expired.value().cloned()),
            },
        }
    }
}

impl<ValueT> CacheLoader<ValueT> for ConfiguredCacheLoader<ValueT>
where
    ValueT: 'static + Clone + Send + Sync,
{
    fn load<'this>(
        &'this self,
        request: &'this CacheLoadRequest<ValueT>,
        is_async: bool,
        expired: Option<&'this CacheEntry<ValueT>>,
    ) -> BoxFuture<'this, Result<LoadResult<ValueT>, LoadError>> {
        async move {
            let settings = &request.caching;
            match self.fetcher.fetch(settings.key()).await {
                Ok(value) => Ok(LoadResult::cached(settings.entry(Some(value)))),

                Err(error) => match expired {
                    Some(expired) => self.expired_failure(settings, is_async, expired, error),
                    None => self.missing_failure(settings, is_async, error),
                },
            }
        }
        .boxed()
    }
}

fn recover<ValueT>(
    caching: FailureCaching,
    settings: &CachingSettings,
    value: Option<ValueT>,
) -> Result<LoadResult<ValueT>, LoadError> {
    Ok(match caching {
        FailureCaching::None => LoadResult::uncached(settings.entry(value)),
        FailureCaching::Stale => LoadResult::cached(CacheEntry::new(
            value,
            settings.hard_ttl(),
            Duration::ZERO,
        )?),
        FailureCaching::RequestTtl => LoadResult::cached(settings.entry(value)),
    })
}

fn log_failure(
    logging: FailureLogging,
    settings: &CachingSettings,
    is_async: bool,
    situation: &str,
    error: &BoxError,
) {
    match logging {
        FailureLogging::None => {}

        FailureLogging::Message => {
            tracing::warn!(key = %settings, is_async, "{} load failed: {}", situation, error)
        }

        FailureLogging::Full => tracing::error!(
            key = %settings,
            is_async,
            "{} load failed: {}",
            situation,
            error_chain(error.as_ref())
        ),
    }
}
