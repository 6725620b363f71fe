use super::{super::super::error::*, client::*};

use {
    dashmap::{mapref::entry::Entry, *},
    std::{sync::*, time::*},
};

//
// MemoryKeyValueClient
//

/// In-process [KeyValueClient] with item expiry.
///
/// Clones share the same items. An artificial latency can be added to every operation to
/// simulate a remote server.
#[derive(Clone, Debug, Default)]
pub struct MemoryKeyValueClient {
    items: Arc<DashMap<String, Item>>,
    latency: Option<Duration>,
}

impl MemoryKeyValueClient {
    /// Add latency to every operation.
    ///
    /// [None] by default.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of items, expired or not.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether there are no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Keys of all items, expired or not.
    pub fn keys(&self) -> Vec<String> {
        self.items.iter().map(|item| item.key().clone()).collect()
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl KeyValueClient for MemoryKeyValueClient {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BoxError> {
        self.delay().await;

        let now = Instant::now();
        if let Some(item) = self.items.get(key) {
            if !item.is_expired(now) {
                return Ok(Some(item.value.clone()));
            }
        }

        self.items.remove_if(key, |_, item| item.is_expired(now));
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool, BoxError> {
        self.delay().await;

        let expires_at = match ttl {
            Some(ttl) => Some(Instant::now().checked_add(ttl).ok_or("TTL is out of range")?),
            None => None,
        };

        self.items.insert(key.into(), Item { value, expires_at });
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, BoxError> {
        self.delay().await;

        let now = Instant::now();
        Ok(self
            .items
            .remove(key)
            .is_some_and(|(_, item)| !item.is_expired(now)))
    }

    async fn increment(&self, key: &str, delta: u64, initial: u64) -> Result<u64, BoxError> {
        self.delay().await;

        let now = Instant::now();
        match self.items.entry(key.into()) {
            Entry::Occupied(mut occupied) if !occupied.get().is_expired(now) => {
                let counter: u64 = std::str::from_utf8(&occupied.get().value)?.trim().parse()?;
                let counter = counter.wrapping_add(delta);
                occupied.get_mut().value = counter.to_string().into_bytes();
                Ok(counter)
            }

            entry => {
                entry.insert(Item {
                    value: initial.to_string().into_bytes(),
                    expires_at: None,
                });
                Ok(initial)
            }
        }
    }

    async fn flush(&self) -> Result<(), BoxError> {
        self.delay().await;
        self.items.clear();
        Ok(())
    }
}

//
// Item
//

#[derive(Clone, Debug)]
struct Item {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Item {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

#[cfg(test)]
mod tests {
    use super::{super::super::super::test::*, *};

    #[tokio::test]
    async fn test_items_expire() {
        setup();
        let client = MemoryKeyValueClient::default();

        assert!(client.set("a", b"1".to_vec(), Some(Duration::from_millis(50))).await.unwrap());
        assert!(client.set("b", b"2".to_vec(), None).await.unwrap());
        assert_eq!(client.get("a").await.unwrap(), Some(b"1".to_vec()));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(client.get("a").await.unwrap(), None);
        assert_eq!(client.get("b").await.unwrap(), Some(b"2".to_vec()));
        assert!(!client.delete("a").await.unwrap());
        assert!(client.delete("b").await.unwrap());
    }

    #[tokio::test]
    async fn test_increment() {
        setup();
        let client = MemoryKeyValueClient::default();

        assert_eq!(client.increment("n", 1, 7).await.unwrap(), 7);
        assert_eq!(client.increment("n", 1, 7).await.unwrap(), 8);
        assert_eq!(client.increment("n", 0, 7).await.unwrap(), 8);
        assert_eq!(client.get("n").await.unwrap(), Some(b"8".to_vec()));

        client.set("s", b"text".to_vec(), None).await.unwrap();
        assert!(client.increment("s", 1, 0).await.is_err());

        client.flush().await.unwrap();
        assert!(client.is_empty());
    }
}
