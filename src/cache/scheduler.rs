use super::{configuration::*, entry::*, error::*, periodic::*, settings::*};

use {
    futures::future::*,
    parking_lot::*,
    std::{
        collections::*,
        sync::{
            Arc, Weak,
            atomic::{AtomicBool, Ordering},
        },
        time::*,
    },
    tokio::sync::Semaphore,
};

//
// Reloader
//

/// Runs a background reload. Implemented by the cache that owns the scheduler.
pub(crate) trait Reloader<ValueT>
where
    Self: Send + Sync,
{
    fn reload(
        &self,
        request: CacheLoadRequest<ValueT>,
        expired: Option<CacheEntry<ValueT>>,
        last_refresh: Option<Arc<LastRefresh>>,
    ) -> BoxFuture<'_, ()>;
}

//
// LastRefresh
//

/// When a scheduled request was last successfully refreshed.
#[derive(Debug, Default)]
pub(crate) struct LastRefresh(Mutex<Option<SystemTime>>);

impl LastRefresh {
    pub(crate) fn get(&self) -> Option<SystemTime> {
        *self.0.lock()
    }

    pub(crate) fn touch(&self) {
        *self.0.lock() = Some(SystemTime::now());
    }
}

//
// ScheduledRequest
//

/// The scheduler's own copy of a request, with its refresh stamp.
#[derive(Clone, Debug)]
pub struct ScheduledRequest<ValueT> {
    /// Request.
    pub request: CacheLoadRequest<ValueT>,

    last_refresh: Arc<LastRefresh>,
}

impl<ValueT> ScheduledRequest<ValueT> {
    fn new(request: CacheLoadRequest<ValueT>) -> Self {
        Self {
            request,
            last_refresh: Default::default(),
        }
    }

    /// When the request was last successfully refreshed.
    pub fn last_refresh(&self) -> Option<SystemTime> {
        self.last_refresh.get()
    }

    /// When the request is next due for a refresh.
    ///
    /// Never-refreshed requests are due immediately. [None] if the time can't be represented.
    pub fn soft_expire(&self) -> Option<SystemTime> {
        match self.last_refresh.get() {
            Some(last_refresh) => last_refresh.checked_add(self.request.caching.soft_ttl()),
            None => Some(UNIX_EPOCH),
        }
    }
}

//
// Scheduler
//

/// Coordinates background reloads.
///
/// At most one reload runs per key: a reload requested while another is in flight for the same key
/// is dropped. Reloads are spawned on a runtime and bounded by a pool of permits.
///
/// Scheduled requests are checked by a sweep task that starts with the first
/// [schedule](Self::schedule) and reloads each one once its soft TTL has elapsed since its last
/// successful refresh.
pub struct Scheduler<ValueT> {
    state: Arc<SchedulerState<ValueT>>,
    sweeper: Mutex<Option<PeriodicTask>>,
}

struct SchedulerState<ValueT> {
    configuration: SchedulerConfiguration,
    reloader: Weak<dyn Reloader<ValueT>>,
    reloading: Arc<Mutex<HashSet<String>>>,
    scheduled: Mutex<HashMap<String, ScheduledRequest<ValueT>>>,
    permits: Arc<Semaphore>,
    closed: AtomicBool,
}

impl<ValueT> Scheduler<ValueT>
where
    ValueT: 'static + Clone + Send + Sync,
{
    pub(crate) fn new(configuration: SchedulerConfiguration, reloader: Weak<dyn Reloader<ValueT>>) -> Self {
        let permits = Arc::new(Semaphore::new(configuration.effective_max_concurrent_reloads()));
        Self {
            state: Arc::new(SchedulerState {
                configuration,
                reloader,
                reloading: Default::default(),
                scheduled: Default::default(),
                permits,
                closed: AtomicBool::new(false),
            }),
            sweeper: Default::default(),
        }
    }

    /// Configuration.
    pub fn configuration(&self) -> &SchedulerConfiguration {
        &self.state.configuration
    }

    /// Start a background reload unless one is already in flight for the key.
    ///
    /// Returns whether a reload was started.
    pub fn start_reload(
        &self,
        request: &CacheLoadRequest<ValueT>,
        expired: Option<CacheEntry<ValueT>>,
    ) -> Result<bool, ReloadError> {
        self.state.start_reload(request.clone(), expired, None)
    }

    /// Whether a reload is in flight for the key.
    pub fn is_reloading(&self, key: &str) -> bool {
        self.state.reloading.lock().contains(key)
    }

    /// Add a request to be refreshed periodically, replacing a previous one for the same key.
    ///
    /// A replaced request keeps its refresh stamp.
    pub fn schedule(&self, request: &CacheLoadRequest<ValueT>) -> Result<(), ScheduleError> {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(ScheduleError::Closed);
        }

        {
            let mut scheduled = self.state.scheduled.lock();
            match scheduled.get_mut(request.key()) {
                Some(scheduled_request) => scheduled_request.request = request.clone(),
                None => {
                    scheduled.insert(request.key().into(), ScheduledRequest::new(request.clone()));
                }
            }
        }

        tracing::debug!(key = request.key(), "scheduled");
        self.start_sweeper()
    }

    /// Stop refreshing a request.
    ///
    /// Returns whether it was scheduled.
    pub fn unschedule(&self, key: &str) -> bool {
        self.state.scheduled.lock().remove(key).is_some()
    }

    /// Whether a request is scheduled.
    pub fn is_scheduled(&self, key: &str) -> bool {
        self.state.scheduled.lock().contains_key(key)
    }

    /// Scheduled request.
    pub fn scheduled(&self, key: &str) -> Option<ScheduledRequest<ValueT>> {
        self.state.scheduled.lock().get(key).cloned()
    }

    /// Keys of all scheduled requests.
    pub fn scheduled_keys(&self) -> Vec<String> {
        self.state.scheduled.lock().keys().cloned().collect()
    }

    /// Check all scheduled requests once and start reloads for those that are due.
    ///
    /// This is what the sweep task does on every tick.
    pub fn sweep(&self) {
        self.state.sweep()
    }

    /// Stop the sweep task and wait for it to exit.
    ///
    /// Reloads already in flight run to completion.
    pub async fn close(&self) {
        self.state.closed.store(true, Ordering::SeqCst);

        let sweeper = self.sweeper.lock().take();
        if let Some(sweeper) = sweeper {
            sweeper.stop().await;
        }
    }

    fn start_sweeper(&self) -> Result<(), ScheduleError> {
        let mut sweeper = self.sweeper.lock();

        if self.state.closed.load(Ordering::SeqCst) {
            return Err(ScheduleError::Closed);
        }

        if sweeper.is_none() {
            let runtime = self.state.configuration.runtime().ok_or(ScheduleError::NoRuntime)?;
            let state = self.state.clone();
            *sweeper = Some(PeriodicTask::spawn(
                &runtime,
                "scheduler sweep",
                self.state.configuration.effective_interval(),
                move || state.sweep(),
            ));
        }

        Ok(())
    }
}

impl<ValueT> SchedulerState<ValueT>
where
    ValueT: 'static + Clone + Send + Sync,
{
    fn start_reload(
        &self,
        request: CacheLoadRequest<ValueT>,
        expired: Option<CacheEntry<ValueT>>,
        last_refresh: Option<Arc<LastRefresh>>,
    ) -> Result<bool, ReloadError> {
        let key = request.key().to_owned();

        if !self.reloading.lock().insert(key.clone()) {
            tracing::debug!(key = %key, "already reloading");
            return Ok(false);
        }

        // From here on, any early return releases the key
        let guard = ReloadingGuard {
            reloading: self.reloading.clone(),
            key,
        };

        let runtime = self.configuration.runtime().ok_or(ReloadError::NoRuntime)?;

        let permit = self
            .permits
            .clone()
            .try_acquire_owned()
            .map_err(|_| ReloadError::Saturated(self.configuration.effective_max_concurrent_reloads()))?;

        let reloader = self.reloader.clone();
        runtime.spawn(async move {
            match reloader.upgrade() {
                Some(reloader) => reloader.reload(request, expired, last_refresh).await,
                None => tracing::debug!(key = %guard.key, "cache is gone, skipping reload"),
            }

            // The permit goes first, so a released key can always be reloaded
            drop((permit, guard));
        });

        Ok(true)
    }

    fn sweep(&self) {
        let now = SystemTime::now();

        let scheduled: Vec<_> = self.scheduled.lock().values().cloned().collect();
        for scheduled_request in scheduled {
            let key = scheduled_request.request.key().to_owned();

            match scheduled_request.soft_expire() {
                Some(soft_expire) => {
                    if soft_expire > now {
                        continue;
                    }
                }

                None => {
                    tracing::warn!(key = %key, "soft expiry is out of range, skipping");
                    continue;
                }
            }

            let ScheduledRequest { request, last_refresh } = scheduled_request;
            match self.start_reload(request, None, Some(last_refresh)) {
                Ok(true) => tracing::debug!(key = %key, "sweep started reload"),
                Ok(false) => {}
                Err(error) => tracing::warn!(key = %key, "sweep could not start reload: {}", error),
            }
        }
    }
}

//
// ReloadingGuard
//

// Releases a key from the in-flight set when dropped
struct ReloadingGuard {
    reloading: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl Drop for ReloadingGuard {
    fn drop(&mut self) {
        self.reloading.lock().remove(&self.key);
    }
}
