/// Memcached-style key-value storage.
pub mod keyvalue;

/// In-process storage.
pub mod memory;

/// Moka storage.
#[cfg(feature = "moka")]
pub mod moka;
