//! Host services consumed by transfers: filesystem access and the worker pool.

mod fs;
mod pool;

pub use fs::{FileSystem, LocalFileSystem};
pub use pool::{DEFAULT_POOL_SLOTS, PoolError, WorkerPool};
