use std::fmt;
use std::sync::Arc;

use palisade_types::TypeName;
use parking_lot::{ArcRwLockReadGuard, RawRwLock, RwLock};

/// Per-name advisory lock. Only the guard matters; there is no payload.
pub(crate) type LockEntry = Arc<RwLock<()>>;

/// Held read lock on one type name.
///
/// Releasing happens on drop, so a lock can be released at most once. The
/// guard is `Send`: a lock taken on one thread may be released on another.
pub struct ReadLock {
	name: TypeName,
	_guard: ArcRwLockReadGuard<RawRwLock, ()>,
}

impl ReadLock {
	/// Blocks until a read guard on `entry` is available.
	///
	/// Writers in this crate only ever `try_write`, so no writer is ever
	/// queued ahead of a reader and a thread may hold several reads on one
	/// entry.
	pub(crate) fn acquire(name: TypeName, entry: &LockEntry) -> Self {
		Self {
			_guard: entry.read_arc(),
			name,
		}
	}

	/// Name this lock protects.
	pub fn name(&self) -> &TypeName {
		&self.name
	}

	/// Releases the lock, handing back the name it protected.
	pub fn release(self) -> TypeName {
		self.name
	}
}

impl fmt::Debug for ReadLock {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("ReadLock").field(&self.name).finish()
	}
}
