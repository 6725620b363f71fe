use super::{entry::*, error::*, loader::*};

use std::{fmt, sync::*, time::*};

//
// CachingSettings
//

/// Key and TTLs for a cached value.
///
/// The hard TTL is when the value is evicted. The soft TTL is when it becomes stale and should be
/// refreshed. Both are whole seconds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachingSettings {
    key: String,
    hard_ttl: Duration,
    soft_ttl: Duration,
}

impl CachingSettings {
    /// Constructor.
    ///
    /// The key must not be blank, the hard TTL must be at least 1s, and the soft TTL must not
    /// exceed the hard TTL.
    pub fn new<KeyT>(key: KeyT, hard_ttl: Duration, soft_ttl: Duration) -> Result<Self, SettingsError>
    where
        KeyT: Into<String>,
    {
        let key = key.into();
        validate_key(&key)?;

        let hard_ttl = whole_seconds(hard_ttl);
        let soft_ttl = whole_seconds(soft_ttl);

        if hard_ttl < MIN_EVICT_TTL {
            return Err(SettingsError::HardTtlTooShort(hard_ttl));
        }

        if soft_ttl > hard_ttl {
            return Err(SettingsError::StaleTtlExceedsEvictTtl {
                stale: soft_ttl,
                evict: hard_ttl,
            });
        }

        Ok(Self {
            key,
            hard_ttl,
            soft_ttl,
        })
    }

    /// Constructor from human-readable durations, e.g. "10m" or "1h 30s".
    pub fn parse<KeyT>(key: KeyT, hard_ttl: &str, soft_ttl: &str) -> Result<Self, SettingsError>
    where
        KeyT: Into<String>,
    {
        Self::new(key, parse_duration(hard_ttl)?, parse_duration(soft_ttl)?)
    }

    /// User key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Hard (evict) TTL.
    pub fn hard_ttl(&self) -> Duration {
        self.hard_ttl
    }

    /// Soft (stale) TTL.
    pub fn soft_ttl(&self) -> Duration {
        self.soft_ttl
    }

    /// A fresh, unstored entry for a value using these TTLs.
    pub fn entry<ValueT>(&self, value: Option<ValueT>) -> CacheEntry<ValueT> {
        // Our TTLs were validated in the constructor
        CacheEntry::new(value, self.hard_ttl, self.soft_ttl).unwrap_or_else(|_| CacheEntry::empty())
    }
}

impl fmt::Display for CachingSettings {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.key, formatter)
    }
}

//
// LoadingSettings
//

/// How a missing or stale value gets loaded.
pub struct LoadingSettings<ValueT> {
    /// Loader.
    pub loader: CacheLoaderRef<ValueT>,

    /// Whether a miss is loaded in the background (the caller gets the empty sentinel).
    pub missing_load_async: bool,

    /// Whether a stale hit is refreshed in the background (the caller gets the stale entry).
    pub expired_load_async: bool,
}

impl<ValueT> LoadingSettings<ValueT> {
    /// Constructor.
    pub fn new(loader: CacheLoaderRef<ValueT>) -> Self {
        Self {
            loader,
            missing_load_async: false,
            expired_load_async: false,
        }
    }
}

impl<ValueT> Clone for LoadingSettings<ValueT> {
    fn clone(&self) -> Self {
        // #[derive(Clone)] would require ValueT: Clone
        Self {
            loader: self.loader.clone(),
            missing_load_async: self.missing_load_async,
            expired_load_async: self.expired_load_async,
        }
    }
}

impl<ValueT> fmt::Debug for LoadingSettings<ValueT> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("LoadingSettings")
            .field("missing_load_async", &self.missing_load_async)
            .field("expired_load_async", &self.expired_load_async)
            .finish_non_exhaustive()
    }
}

//
// CacheLoadRequest
//

/// Everything [CacheBase::get_or_load](super::CacheBase::get_or_load) needs: key, TTLs, and
/// loader.
#[derive(Clone, Debug)]
pub struct CacheLoadRequest<ValueT> {
    /// Caching settings.
    pub caching: CachingSettings,

    /// Loading settings.
    pub loading: LoadingSettings<ValueT>,
}

impl<ValueT> CacheLoadRequest<ValueT> {
    /// Constructor.
    pub fn new(caching: CachingSettings, loading: LoadingSettings<ValueT>) -> Self {
        Self { caching, loading }
    }

    /// Builder.
    pub fn builder<KeyT, LoaderT>(key: KeyT, loader: LoaderT) -> CacheLoadRequestBuilder<ValueT>
    where
        KeyT: Into<String>,
        LoaderT: CacheLoader<ValueT>,
    {
        CacheLoadRequestBuilder::new(key, Arc::new(loader))
    }

    /// User key.
    pub fn key(&self) -> &str {
        self.caching.key()
    }

    /// Loader.
    pub fn loader(&self) -> &CacheLoaderRef<ValueT> {
        &self.loading.loader
    }
}

//
// CacheLoadRequestBuilder
//

/// Builder for [CacheLoadRequest].
///
/// Validation happens in [build](Self::build).
pub struct CacheLoadRequestBuilder<ValueT> {
    key: String,
    hard_ttl: Result<Duration, SettingsError>,
    soft_ttl: Result<Duration, SettingsError>,
    loading: LoadingSettings<ValueT>,
}

impl<ValueT> CacheLoadRequestBuilder<ValueT> {
    /// Constructor.
    ///
    /// The default TTLs are 1 minute (hard) and 1 minute (soft).
    pub fn new<KeyT>(key: KeyT, loader: CacheLoaderRef<ValueT>) -> Self
    where
        KeyT: Into<String>,
    {
        Self {
            key: key.into(),
            hard_ttl: Ok(DEFAULT_TTL),
            soft_ttl: Ok(DEFAULT_TTL),
            loading: LoadingSettings::new(loader),
        }
    }

    /// Hard (evict) and soft (stale) TTLs.
    pub fn ttl(mut self, hard_ttl: Duration, soft_ttl: Duration) -> Self {
        self.hard_ttl = Ok(hard_ttl);
        self.soft_ttl = Ok(soft_ttl);
        self
    }

    /// Hard and soft TTLs as human-readable durations.
    pub fn ttl_str(mut self, hard_ttl: &str, soft_ttl: &str) -> Self {
        self.hard_ttl = parse_duration(hard_ttl);
        self.soft_ttl = parse_duration(soft_ttl);
        self
    }

    /// Whether a miss is loaded in the background.
    ///
    /// The default is false.
    pub fn missing_load_async(mut self, missing_load_async: bool) -> Self {
        self.loading.missing_load_async = missing_load_async;
        self
    }

    /// Whether a stale hit is refreshed in the background.
    ///
    /// The default is false.
    pub fn expired_load_async(mut self, expired_load_async: bool) -> Self {
        self.loading.expired_load_async = expired_load_async;
        self
    }

    /// Build.
    pub fn build(self) -> Result<CacheLoadRequest<ValueT>, SettingsError> {
        let caching = CachingSettings::new(self.key, self.hard_ttl?, self.soft_ttl?)?;
        Ok(CacheLoadRequest::new(caching, self.loading))
    }
}

const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Fails for empty or whitespace-only keys.
pub fn validate_key(key: &str) -> Result<(), SettingsError> {
    if key.trim().is_empty() {
        Err(SettingsError::BlankKey)
    } else {
        Ok(())
    }
}

/// Parse a human-readable duration.
pub fn parse_duration(input: &str) -> Result<Duration, SettingsError> {
    duration_str::parse(input).map_err(|reason| SettingsError::InvalidDuration {
        input: input.into(),
        reason: reason.to_string(),
    })
}
