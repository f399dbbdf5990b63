use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::runtime::{Handle, Runtime};
use tokio_util::sync::CancellationToken;

use crate::DrainReport;
use crate::inflight::InFlight;
use crate::panic::panic_message;

/// Construction options for a [`WorkerPool`].
#[derive(Debug, Clone)]
pub struct PoolOptions {
	/// Maximum number of tasks running concurrently.
	pub workers: usize,
	/// Prefix for worker thread names.
	pub thread_name: String,
}

impl Default for PoolOptions {
	fn default() -> Self {
		Self {
			workers: 2,
			thread_name: "palisade-worker".to_owned(),
		}
	}
}

/// Submission error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
	/// The pool has been shut down.
	Closed,
}

impl std::fmt::Display for SubmitError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Closed => f.write_str("worker pool is closed"),
		}
	}
}

impl std::error::Error for SubmitError {}

struct PoolInner {
	name: String,
	runtime: Mutex<Option<Runtime>>,
	handle: Handle,
	closed: CancellationToken,
	inflight: Arc<InFlight>,
	completed: AtomicU64,
}

impl Drop for PoolInner {
	fn drop(&mut self) {
		if let Some(runtime) = self.runtime.get_mut().take() {
			runtime.shutdown_background();
		}
	}
}

/// Fixed-size pool running blocking closures off the caller's thread.
///
/// Cloning yields another handle to the same pool.
#[derive(Clone)]
pub struct WorkerPool {
	inner: Arc<PoolInner>,
}

impl std::fmt::Debug for WorkerPool {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("WorkerPool")
			.field("name", &self.inner.name)
			.field("closed", &self.is_closed())
			.field("pending", &self.pending())
			.finish()
	}
}

impl WorkerPool {
	/// Builds the pool and its runtime.
	///
	/// # Errors
	///
	/// Returns the I/O error Tokio reports if worker threads cannot be created.
	pub fn new(options: PoolOptions) -> std::io::Result<Self> {
		let runtime = tokio::runtime::Builder::new_multi_thread()
			.worker_threads(1)
			.max_blocking_threads(options.workers.max(1))
			.thread_name(options.thread_name.clone())
			.build()?;
		let handle = runtime.handle().clone();
		tracing::debug!(pool = %options.thread_name, workers = options.workers, "worker.pool.start");

		Ok(Self {
			inner: Arc::new(PoolInner {
				name: options.thread_name,
				runtime: Mutex::new(Some(runtime)),
				handle,
				closed: CancellationToken::new(),
				inflight: Arc::new(InFlight::default()),
				completed: AtomicU64::new(0),
			}),
		})
	}

	/// Queues `task` for execution.
	///
	/// `label` names the task in trace output. A panicking task is logged and
	/// does not take the pool down.
	///
	/// # Errors
	///
	/// [`SubmitError::Closed`] once [`Self::shutdown`] has started.
	pub fn submit<F>(&self, label: &'static str, task: F) -> Result<(), SubmitError>
	where
		F: FnOnce() + Send + 'static,
	{
		// Registered before the closed check so a concurrent shutdown waits for us.
		let guard = self.inner.inflight.enter();
		if self.inner.closed.is_cancelled() {
			return Err(SubmitError::Closed);
		}

		tracing::trace!(pool = %self.inner.name, task = label, pending = self.inner.inflight.pending(), "worker.submit");
		let inner = Arc::clone(&self.inner);
		drop(self.inner.handle.spawn_blocking(move || {
			let _guard = guard;
			match catch_unwind(AssertUnwindSafe(task)) {
				Ok(()) => {
					inner.completed.fetch_add(1, Ordering::Relaxed);
				}
				Err(payload) => {
					tracing::warn!(pool = %inner.name, task = label, panic = %panic_message(payload.as_ref()), "worker.task.panicked");
				}
			}
		}));
		Ok(())
	}

	/// Number of tasks queued or running.
	pub fn pending(&self) -> usize {
		self.inner.inflight.pending()
	}

	/// Returns true once shutdown has started.
	pub fn is_closed(&self) -> bool {
		self.inner.closed.is_cancelled()
	}

	/// Stops accepting work and waits up to `timeout` for in-flight tasks.
	///
	/// Must not be called from a task running on this pool. Subsequent calls
	/// only report; the runtime is torn down by the first.
	pub fn shutdown(&self, timeout: Duration) -> DrainReport {
		self.inner.closed.cancel();
		let start = Instant::now();
		let idle = self.inner.inflight.wait_idle(timeout);
		let waited = start.elapsed();

		if let Some(runtime) = self.inner.runtime.lock().take() {
			runtime.shutdown_background();
		}

		let report = DrainReport {
			completed: self.inner.completed.load(Ordering::Relaxed),
			pending: self.inner.inflight.pending(),
			waited,
			budget_exhausted: !idle,
		};
		if report.budget_exhausted {
			tracing::warn!(pool = %self.inner.name, pending = report.pending, "worker.pool.drain_timeout");
		} else {
			tracing::debug!(pool = %self.inner.name, completed = report.completed, "worker.pool.stopped");
		}
		report
	}
}
