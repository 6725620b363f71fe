use super::super::super::{entry::*, error::*, periodic::*, storage::*};

use {
    dashmap::*,
    std::{sync::*, time::*},
    tokio::runtime::*,
};

//
// MemoryStorage
//

/// In-process [CacheStorage] over a concurrent hash map.
///
/// Evicted entries are removed when they are read. A reaper task can additionally sweep them out
/// periodically, see [reaping_every](Self::reaping_every).
///
/// Clones share the same map, so several caches can share the same entries.
pub struct MemoryStorage<ValueT> {
    entries: Arc<DashMap<String, CacheEntry<ValueT>>>,
}

impl<ValueT> MemoryStorage<ValueT>
where
    ValueT: 'static + Clone + Send + Sync,
{
    /// Start a reaper task on the current runtime.
    ///
    /// The interval is clamped to at least 1 second. The reaper belongs to the caller and runs
    /// until the returned task is stopped or dropped, regardless of which caches share this
    /// storage. [None] if there is no current runtime.
    pub fn reaping_every(&self, interval: Duration) -> Option<PeriodicTask> {
        match Handle::try_current() {
            Ok(runtime) => Some(self.reaping_on(&runtime, interval)),

            Err(error) => {
                tracing::warn!("not reaping: {}", error);
                None
            }
        }
    }

    /// Start a reaper task on a runtime.
    ///
    /// See [reaping_every](Self::reaping_every).
    pub fn reaping_on(&self, runtime: &Handle, interval: Duration) -> PeriodicTask {
        let entries = self.entries.clone();
        PeriodicTask::spawn(runtime, "memory storage reaper", interval.max(MIN_REAP_INTERVAL), move || {
            reap(&entries);
        })
    }

    /// Remove all evicted entries now.
    ///
    /// Returns how many were removed.
    pub fn reap(&self) -> usize {
        reap(&self.entries)
    }

    /// Whether there is an entry for a physical key, evicted or not.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries, evicted or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<ValueT> CacheStorage<ValueT> for MemoryStorage<ValueT>
where
    ValueT: 'static + Clone + Send + Sync,
{
    async fn get(&self, key: &str) -> Result<Option<CacheEntry<ValueT>>, StorageError> {
        let now = SystemTime::now();

        // The map reference must be released before removing
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_evicted_at(now) {
                return Ok(Some((*entry).clone()));
            }
        }

        if self.entries.remove_if(key, |_, entry| entry.is_evicted_at(now)).is_some() {
            tracing::debug!(key, "evicted on read");
        }

        Ok(None)
    }

    async fn set(&self, key: &str, entry: CacheEntry<ValueT>) -> Result<bool, StorageError> {
        self.entries.insert(key.into(), entry);
        Ok(true)
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn remove_all(&self) -> Result<(), StorageError> {
        self.entries.clear();
        Ok(())
    }
}

impl<ValueT> Clone for MemoryStorage<ValueT> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<ValueT> Default for MemoryStorage<ValueT> {
    fn default() -> Self {
        Self {
            entries: Default::default(),
        }
    }
}

const MIN_REAP_INTERVAL: Duration = Duration::from_secs(1);

fn reap<ValueT>(entries: &DashMap<String, CacheEntry<ValueT>>) -> usize {
    let now = SystemTime::now();
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_evicted_at(now));

    let reaped = before.saturating_sub(entries.len());
    if reaped > 0 {
        tracing::debug!("reaped {} evicted entries", reaped);
    }
    reaped
}
