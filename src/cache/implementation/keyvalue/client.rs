use super::super::super::error::*;

use std::{future::*, time::*};

//
// KeyValueClient
//

/// Client for a memcached-style key-value store.
///
/// Values are opaque bytes. Counters are stored as ASCII decimal values so that they can be
/// incremented atomically on the server.
///
/// Note that these are `async` functions written in longer form in order to include the `Send`
/// constraint. Implementations can simply use `async fn`.
#[allow(async_fn_in_trait)]
pub trait KeyValueClient
where
    Self: 'static + Send + Sync,
{
    /// Get a value.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, BoxError>> + Send;

    /// Set a value, expiring after `ttl` if provided.
    ///
    /// Returns whether it was stored.
    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<bool, BoxError>> + Send;

    /// Delete a value.
    ///
    /// Returns whether there was one.
    fn delete(&self, key: &str) -> impl Future<Output = Result<bool, BoxError>> + Send;

    /// Atomically add `delta` to a counter and return the new value.
    ///
    /// A missing counter is created with `initial`, which is returned as is.
    fn increment(&self, key: &str, delta: u64, initial: u64) -> impl Future<Output = Result<u64, BoxError>> + Send;

    /// Delete all values.
    fn flush(&self) -> impl Future<Output = Result<(), BoxError>> + Send;
}
