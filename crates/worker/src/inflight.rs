use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Count of submitted-but-unfinished tasks with an idle notification.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
	count: Mutex<usize>,
	idle: Condvar,
}

impl InFlight {
	/// Registers one task, returning a guard that must live until it completes.
	///
	/// The guard decrements the counter even if the task panics or is dropped
	/// without running.
	pub(crate) fn enter(self: &Arc<Self>) -> InFlightGuard {
		*self.count.lock() += 1;
		InFlightGuard { inner: Arc::clone(self) }
	}

	pub(crate) fn pending(&self) -> usize {
		*self.count.lock()
	}

	/// Blocks until no task is in flight or `timeout` elapses.
	///
	/// Returns true if the count reached zero.
	pub(crate) fn wait_idle(&self, timeout: Duration) -> bool {
		let deadline = Instant::now() + timeout;
		let mut count = self.count.lock();
		while *count > 0 {
			if self.idle.wait_until(&mut count, deadline).timed_out() {
				return *count == 0;
			}
		}
		true
	}
}

/// Guard tracking one in-flight task.
#[derive(Debug)]
pub(crate) struct InFlightGuard {
	inner: Arc<InFlight>,
}

impl Drop for InFlightGuard {
	fn drop(&mut self) {
		let mut count = self.inner.count.lock();
		debug_assert!(*count > 0, "in-flight underflow");
		*count = count.saturating_sub(1);
		if *count == 0 {
			self.inner.idle.notify_all();
		}
	}
}
