pub mod core;
pub mod mem_backend;
pub mod redis;

#[cfg(feature = "testing")]
pub mod mock;

#[cfg(test)]
mod mem_tests;

#[macro_use]
extern crate log;
#[macro_use]
extern crate async_trait;

pub use crate::core::{Backend, SharedBackend};
pub use crate::mem_backend::MemBackend;
pub use crate::redis::RedisBackend;

#[cfg(feature = "testing")]
pub use crate::mock::MockBackend;
