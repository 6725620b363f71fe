mod client;
mod memory;
mod storage;

#[allow(unused_imports)]
pub use {client::*, memory::*, storage::*};
