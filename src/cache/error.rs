use super::settings::*;

use {
    std::{error::Error as StdError, fmt::Write, time::*},
    thiserror::Error,
};

/// Boxed error used for fetcher and client causes.
pub type BoxError = Box<dyn StdError + Send + Sync>;

//
// SettingsError
//

/// Invalid key, TTL, or duration.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    /// The key is empty or whitespace.
    #[error("cache key is blank")]
    BlankKey,

    /// The hard (evict) TTL is shorter than one second.
    #[error("hard TTL must be at least 1s, got {0:?}")]
    HardTtlTooShort(Duration),

    /// The stale TTL is longer than the evict TTL.
    #[error("stale TTL {stale:?} exceeds evict TTL {evict:?}")]
    StaleTtlExceedsEvictTtl {
        /// Stale TTL.
        stale: Duration,

        /// Evict TTL.
        evict: Duration,
    },

    /// A human-readable duration could not be parsed.
    #[error("invalid duration {input:?}: {reason}")]
    InvalidDuration {
        /// The input.
        input: String,

        /// Parser message.
        reason: String,
    },
}

//
// StorageError
//

/// Storage backend failure.
///
/// Never surfaces to callers of [CacheBase](super::CacheBase): it is logged and converted to a
/// miss or to `false`.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A backend operation did not complete in time.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// An entry could not be (de)serialized.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend client failed.
    #[error("client failed: {0}")]
    Client(#[source] BoxError),

    /// The backend has been closed.
    #[error("storage is closed")]
    Closed,
}

//
// LoadError
//

/// Synchronous load failure.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The loader failed and its failure recipe says to fail.
    #[error("failed to load {settings}")]
    Failed {
        /// Caching settings of the failed request.
        settings: CachingSettings,

        /// Cause.
        #[source]
        source: BoxError,
    },

    /// The loader produced an entry with invalid settings.
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl LoadError {
    /// Constructor.
    pub fn failed<ErrorT>(settings: CachingSettings, source: ErrorT) -> Self
    where
        ErrorT: Into<BoxError>,
    {
        Self::Failed {
            settings,
            source: source.into(),
        }
    }
}

//
// ScheduleError
//

/// Failure to register a request for periodic refresh.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    /// The cache was built without a scheduler.
    #[error("no scheduler is configured for this cache")]
    NoScheduler,

    /// The scheduler has been closed.
    #[error("scheduler is closed")]
    Closed,

    /// There is no tokio runtime to run the sweep on.
    #[error("no runtime available to run the sweep")]
    NoRuntime,
}

//
// ReloadError
//

/// Failure to submit a background reload.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ReloadError {
    /// All reload permits are taken.
    #[error("reload pool is saturated ({0} in flight)")]
    Saturated(usize),

    /// There is no tokio runtime to spawn on.
    #[error("no runtime available to spawn reload")]
    NoRuntime,
}

/// Renders an error followed by its whole `source()` chain.
pub fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut chain = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let _ = write!(chain, ": {}", cause);
        source = cause.source();
    }
    chain
}
