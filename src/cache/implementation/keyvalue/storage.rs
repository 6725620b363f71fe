use super::{
    super::super::{configuration::*, entry::*, error::*, storage::*},
    client::*,
};

use {
    duration_str::*,
    serde::{Serialize, de::DeserializeOwned},
    sha2::{Digest, Sha256},
    std::{future::*, sync::*, time::*},
};

//
// KeyValueStorage
//

/// [CacheStorage] over a memcached-style [KeyValueClient].
///
/// Entries are stored as JSON and expire on the server when their evict TTL elapses.
///
/// Physical keys are `namespace:key`, or `namespace:version:key` with namespace versioning. Keys
/// that are too long or that contain whitespace or control characters are replaced by
/// `namespace:` followed by the SHA-256 of the key in hex.
///
/// With namespace versioning, [remove_all](CacheStorage::remove_all) increments a version counter
/// instead of flushing the server. Entries written under an older version become unreachable and
/// are left to expire.
///
/// Every client operation is bounded by the configured timeout. Timed out reads, writes, and
/// removals are logged and treated as a miss or as `false`.
pub struct KeyValueStorage<ClientT> {
    client: Arc<ClientT>,
    configuration: Arc<KeyValueConfiguration>,
}

impl<ClientT> KeyValueStorage<ClientT>
where
    ClientT: KeyValueClient,
{
    /// Constructor.
    pub fn new(client: ClientT, configuration: KeyValueConfiguration) -> Self {
        Self {
            client: Arc::new(client),
            configuration: Arc::new(configuration),
        }
    }

    /// Client.
    pub fn client(&self) -> &ClientT {
        &self.client
    }

    /// Configuration.
    pub fn configuration(&self) -> &KeyValueConfiguration {
        &self.configuration
    }

    /// Key of the namespace version counter.
    pub fn version_key(&self) -> String {
        format!("{}:__version__", self.configuration.namespace)
    }

    /// Current namespace version.
    ///
    /// 0 if never incremented.
    pub async fn version(&self) -> Result<u64, StorageError> {
        match self.timed(self.client.get(&self.version_key())).await? {
            Some(version) => parse_counter(&version),
            None => Ok(0),
        }
    }

    async fn timed<FutureT, OutputT>(&self, future: FutureT) -> Result<OutputT, StorageError>
    where
        FutureT: Future<Output = Result<OutputT, BoxError>>,
    {
        let timeout = self.configuration.operation_timeout;
        match tokio::time::timeout(timeout, future).await {
            Ok(result) => result.map_err(StorageError::Client),
            Err(_) => Err(StorageError::Timeout(timeout)),
        }
    }
}

impl<ValueT, ClientT> CacheStorage<ValueT> for KeyValueStorage<ClientT>
where
    ValueT: 'static + Clone + Send + Sync + Serialize + DeserializeOwned,
    ClientT: KeyValueClient,
{
    async fn get(&self, key: &str) -> Result<Option<CacheEntry<ValueT>>, StorageError> {
        match self.timed(self.client.get(key)).await {
            Ok(Some(bytes)) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Ok(None) => Ok(None),
            Err(StorageError::Timeout(timeout)) => {
                tracing::warn!(key, "get timed out after {}", timeout.human_format());
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    async fn set(&self, key: &str, entry: CacheEntry<ValueT>) -> Result<bool, StorageError> {
        let ttl = entry
            .time_to_evict_at(SystemTime::now())
            .unwrap_or(entry.evict_ttl());
        if ttl.is_zero() {
            tracing::debug!(key, "not storing, already evicted");
            return Ok(false);
        }

        let bytes = serde_json::to_vec(&entry)?;
        match self.timed(self.client.set(key, bytes, Some(ttl))).await {
            Err(StorageError::Timeout(timeout)) => {
                tracing::warn!(key, "set timed out after {}", timeout.human_format());
                Ok(false)
            }
            result => result,
        }
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        match self.timed(self.client.delete(key)).await {
            Err(StorageError::Timeout(timeout)) => {
                tracing::warn!(key, "remove timed out after {}", timeout.human_format());
                Ok(false)
            }
            result => result,
        }
    }

    async fn remove_all(&self) -> Result<(), StorageError> {
        if self.configuration.namespace_versioning {
            let version = self.timed(self.client.increment(&self.version_key(), 1, 1)).await?;
            tracing::debug!(namespace = %self.configuration.namespace, version, "namespace version incremented");
            Ok(())
        } else {
            self.timed(self.client.flush()).await
        }
    }

    async fn cache_key(&self, key: &str) -> Result<String, StorageError> {
        let namespace = &self.configuration.namespace;

        let natural_key = if self.configuration.namespace_versioning {
            format!("{}:{}:{}", namespace, self.version().await?, key)
        } else {
            format!("{}:{}", namespace, key)
        };

        if natural_key.len() > self.configuration.max_key_length
            || natural_key.chars().any(|c| c.is_whitespace() || c.is_control())
        {
            let hashed_key = format!("{}:{}", namespace, hex::encode(Sha256::digest(natural_key.as_bytes())));
            tracing::debug!(key, hashed_key = %hashed_key, "hashed key");
            return Ok(hashed_key);
        }

        Ok(natural_key)
    }
}

impl<ClientT> Clone for KeyValueStorage<ClientT> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            configuration: self.configuration.clone(),
        }
    }
}

fn parse_counter(bytes: &[u8]) -> Result<u64, StorageError> {
    std::str::from_utf8(bytes)
        .map_err(|error| StorageError::Client(error.into()))?
        .trim()
        .parse()
        .map_err(|error: std::num::ParseIntError| StorageError::Client(error.into()))
}
