mod builder;
mod expiry;
mod storage;

#[allow(unused_imports)]
pub use {builder::*, expiry::*, storage::*};
