//! Bounded message pool and the pool-backed queue built on it.

pub mod object_pool;
pub mod queue;

pub use object_pool::MessagePool;
pub use queue::{PoolQueue, SendPolicy};
