use std::time::Duration;

/// Outcome of draining a worker pool on shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
	/// Tasks that ran to completion over the pool's lifetime.
	pub completed: u64,
	/// Tasks still queued or running when the drain returned.
	pub pending: usize,
	/// Time spent waiting for in-flight work.
	pub waited: Duration,
	/// True if the drain gave up before the pool went idle.
	pub budget_exhausted: bool,
}
