//! Run an action while everything it depends on is locked and registered.

use std::sync::Arc;

use palisade_types::{Declaration, TypeName};
use parking_lot::Mutex;

use crate::{ActionError, LockedActionError, LockingActionModel, ReadLock, ResolutionError, StartError};

/// Enumerates the declarations an object needs.
///
/// Later entries may depend on earlier ones; the order is used as given.
pub trait DependencyFinder<T: ?Sized>: Send + Sync {
	fn dependencies(&self, object: &T) -> Result<Vec<Declaration>, ResolutionError>;
}

/// Adapts a closure into a [`DependencyFinder`].
pub struct FnDependencyFinder<F>(pub F);

impl<F> FnDependencyFinder<F> {
	pub fn new<T>(find: F) -> Self
	where
		T: ?Sized,
		F: Fn(&T) -> Result<Vec<Declaration>, ResolutionError> + Send + Sync,
	{
		Self(find)
	}
}

impl<T, F> DependencyFinder<T> for FnDependencyFinder<F>
where
	T: ?Sized,
	F: Fn(&T) -> Result<Vec<Declaration>, ResolutionError> + Send + Sync,
{
	fn dependencies(&self, object: &T) -> Result<Vec<Declaration>, ResolutionError> {
		(self.0)(object)
	}
}

/// Work performed while dependencies are held.
///
/// `run` receives the [`Cleanup`] handle and owns the decision of when the
/// locks are released: it may finish synchronously or hand the object and
/// the handle to another thread.
pub trait LockedAction<T> {
	/// Name used in errors and logs.
	fn name(&self) -> &str;

	fn run(self, object: T, required: Vec<Arc<Declaration>>, cleanup: Cleanup) -> Result<(), ActionError>;
}

/// Adapts a closure into a [`LockedAction`].
pub struct FnLockedAction<F> {
	name: String,
	body: F,
}

impl<F> FnLockedAction<F> {
	pub fn new<T>(name: impl Into<String>, body: F) -> Self
	where
		F: FnOnce(T, Vec<Arc<Declaration>>, Cleanup) -> Result<(), ActionError>,
	{
		Self { name: name.into(), body }
	}
}

impl<T, F> LockedAction<T> for FnLockedAction<F>
where
	F: FnOnce(T, Vec<Arc<Declaration>>, Cleanup) -> Result<(), ActionError>,
{
	fn name(&self) -> &str {
		&self.name
	}

	fn run(self, object: T, required: Vec<Arc<Declaration>>, cleanup: Cleanup) -> Result<(), ActionError> {
		(self.body)(object, required, cleanup)
	}
}

#[derive(Default)]
struct Held {
	locks: Vec<ReadLock>,
	names: Vec<TypeName>,
}

struct CleanupInner {
	model: Arc<LockingActionModel>,
	held: Mutex<Option<Held>>,
}

impl CleanupInner {
	fn finish(model: &Arc<LockingActionModel>, held: Held) {
		tracing::trace!(locks = held.locks.len(), "locked.cleanup");
		drop(held.locks);
		model.maybe_remove_names(held.names);
	}
}

impl Drop for CleanupInner {
	fn drop(&mut self) {
		if let Some(held) = self.held.get_mut().take() {
			Self::finish(&self.model, held);
		}
	}
}

/// Releases the locks taken for a locked action and schedules eviction of
/// its dependencies.
///
/// Clones share state. Only the first [`run`](Self::run) does anything;
/// if no clone ever calls it, dropping the last clone does.
#[derive(Clone)]
pub struct Cleanup {
	inner: Arc<CleanupInner>,
}

impl std::fmt::Debug for Cleanup {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Cleanup").field("done", &self.is_done()).finish()
	}
}

impl Cleanup {
	fn new(model: Arc<LockingActionModel>) -> Self {
		Self {
			inner: Arc::new(CleanupInner {
				model,
				held: Mutex::new(Some(Held::default())),
			}),
		}
	}

	fn hold(&self, lock: ReadLock) {
		if let Some(held) = self.inner.held.lock().as_mut() {
			held.locks.push(lock);
		}
	}

	fn track(&self, name: TypeName) {
		if let Some(held) = self.inner.held.lock().as_mut() {
			held.names.push(name);
		}
	}

	/// Releases everything. Returns false if cleanup already ran.
	pub fn run(&self) -> bool {
		let Some(held) = self.inner.held.lock().take() else {
			return false;
		};
		CleanupInner::finish(&self.inner.model, held);
		true
	}

	pub fn is_done(&self) -> bool {
		self.inner.held.lock().is_none()
	}
}

/// Orchestrates "do X while everything X depends on is locked and present".
#[derive(Debug, Clone)]
pub struct WithLockedTypes {
	model: Arc<LockingActionModel>,
}

impl WithLockedTypes {
	pub fn new(model: Arc<LockingActionModel>) -> Self {
		Self { model }
	}

	pub fn model(&self) -> &Arc<LockingActionModel> {
		&self.model
	}

	/// Finds, locks and registers `object`'s dependencies, then runs `action`.
	///
	/// Does not wait for the action to finish its work; the action calls the
	/// [`Cleanup`] it is given when it is done with the object.
	///
	/// # Errors
	///
	/// [`LockedActionError::Start`] if dependencies cannot be found, locked or
	/// registered; [`LockedActionError::Action`] if `run` returns an error.
	/// Cleanup has already run in both cases.
	pub fn locked_action<T, A, F>(&self, action: A, object: T, finder: &F) -> Result<(), LockedActionError>
	where
		A: LockedAction<T>,
		F: DependencyFinder<T> + ?Sized,
	{
		let action_name = action.name().to_owned();
		let cleanup = Cleanup::new(Arc::clone(&self.model));

		let required = match self.lock_dependencies(&object, finder, &cleanup) {
			Ok(required) => required,
			Err(source) => {
				cleanup.run();
				tracing::debug!(action = %action_name, error = %source, "locked.start_failed");
				return Err(LockedActionError::Start {
					action: action_name,
					source,
				});
			}
		};

		tracing::debug!(action = %action_name, dependencies = required.len(), "locked.run");
		action.run(object, required, cleanup.clone()).map_err(|source| {
			cleanup.run();
			LockedActionError::Action {
				action: action_name,
				source,
			}
		})
	}

	fn lock_dependencies<T, F>(&self, object: &T, finder: &F, cleanup: &Cleanup) -> Result<Vec<Arc<Declaration>>, StartError>
	where
		F: DependencyFinder<T> + ?Sized,
	{
		let deps = finder.dependencies(object)?;
		let mut required = Vec::with_capacity(deps.len());
		for decl in deps {
			cleanup.hold(self.model.read_lock(decl.name()));
			cleanup.track(decl.name().clone());
			self.model.add(&decl)?;
			required.push(self.model.get_raw(decl.name()).unwrap_or_else(|| Arc::new(decl)));
		}
		Ok(required)
	}
}
