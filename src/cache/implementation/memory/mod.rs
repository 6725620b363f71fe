mod storage;

#[allow(unused_imports)]
pub use storage::*;
