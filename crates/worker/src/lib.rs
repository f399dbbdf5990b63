//! Background worker pool for fire-and-forget maintenance work.
//!
//! A [`WorkerPool`] owns a dedicated Tokio runtime and runs submitted closures
//! on its blocking pool. Submission never blocks the caller and the queue is
//! unbounded. [`WorkerPool::shutdown`] stops accepting work and waits, up to
//! a deadline, for everything already submitted to finish.

mod budget;
mod inflight;
mod panic;
mod pool;

pub use budget::DrainReport;
pub use pool::{PoolOptions, SubmitError, WorkerPool};
