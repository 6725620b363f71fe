use {
    std::time::*,
    tokio::{runtime::*, sync::Semaphore},
};

//
// SchedulerConfiguration
//

/// Scheduler configuration.
#[derive(Clone, Debug)]
pub struct SchedulerConfiguration {
    /// How often scheduled requests are checked. Clamped to at least 1 second.
    pub interval: Duration,

    /// Maximum number of reloads running at once. Submissions beyond it are rejected.
    ///
    /// Clamped to [Semaphore::MAX_PERMITS].
    pub max_concurrent_reloads: usize,

    /// Runtime on which reloads and the sweep are spawned.
    ///
    /// When [None] the runtime current at the time of spawning is used.
    pub runtime: Option<Handle>,
}

impl SchedulerConfiguration {
    /// Interval clamped to at least 1 second.
    pub fn effective_interval(&self) -> Duration {
        self.interval.max(MIN_INTERVAL)
    }

    /// Maximum number of concurrent reloads, clamped to what the permit pool supports.
    pub fn effective_max_concurrent_reloads(&self) -> usize {
        self.max_concurrent_reloads.min(Semaphore::MAX_PERMITS)
    }

    /// Explicit runtime or the current one.
    pub fn runtime(&self) -> Option<Handle> {
        match &self.runtime {
            Some(runtime) => Some(runtime.clone()),
            None => Handle::try_current().ok(),
        }
    }
}

impl Default for SchedulerConfiguration {
    fn default() -> Self {
        Self {
            interval: MIN_INTERVAL,
            max_concurrent_reloads: 64,
            runtime: None,
        }
    }
}

const MIN_INTERVAL: Duration = Duration::from_secs(1);

//
// KeyValueConfiguration
//

/// Key-value storage configuration.
#[derive(Clone, Debug)]
pub struct KeyValueConfiguration {
    /// Prefix of all physical keys.
    pub namespace: String,

    /// Bound on each client operation.
    pub operation_timeout: Duration,

    /// Physical keys longer than this are replaced by a hash.
    pub max_key_length: usize,

    /// Whether [remove_all](super::CacheStorage::remove_all) bumps a namespace version instead of
    /// flushing the backend.
    pub namespace_versioning: bool,
}

impl Default for KeyValueConfiguration {
    fn default() -> Self {
        Self {
            namespace: "cache".into(),
            operation_timeout: Duration::from_secs(1),
            max_key_length: 250,
            namespace_versioning: false,
        }
    }
}
