mod aggregate;
mod pool;

pub use aggregate::aggregate;
pub use pool::WorkerPool;
