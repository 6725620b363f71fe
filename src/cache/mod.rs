mod base;
mod builder;
mod configuration;
mod entry;
mod error;
mod hooks;
mod key;
mod periodic;
mod scheduler;
mod settings;
mod storage;
mod tiered;

#[cfg(test)]
mod test;

/// Storage implementations.
pub mod implementation;

/// Loaders.
pub mod loader;

#[allow(unused_imports)]
pub use {
    base::*, builder::*, configuration::*, entry::*, error::*, hooks::*, key::*, periodic::*, scheduler::*,
    settings::*, storage::*, tiered::*,
};
