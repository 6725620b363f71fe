use std::sync::*;

/// Hook to transform a user key before the storage derives its physical key.
///
/// Useful for prefixing keys per tenant or per API so that several caches can share a backend.
pub type CacheKeyHook = Arc<Box<dyn Fn(CacheKeyHookContext) -> String + Send + Sync>>;

//
// CacheKeyHookContext
//

/// Context for [CacheKeyHook].
pub struct CacheKeyHookContext<'this> {
    /// User key.
    pub key: &'this str,
}

impl<'this> CacheKeyHookContext<'this> {
    /// Constructor.
    pub fn new(key: &'this str) -> Self {
        Self { key }
    }
}
