mod configured;
mod loader;

#[allow(unused_imports)]
pub use {configured::*, loader::*};
