//! The locking registry itself.
//!
//! # Invariants
//!
//! - A name's declaration-map entry is inserted only under the add monitor
//!   while the adder holds a read lock on that name, and removed only under
//!   the name's write lock. The two can never overlap.
//! - Nothing is recorded for a name until the backing store has accepted it.
//! - Lock-table entries are never removed. The table grows with the number
//!   of distinct names ever seen; in exchange a thread about to wait on a
//!   lock can never find it replaced, and a re-added name serializes
//!   against the same lock object as before.
//! - Writers never block. `maybe_remove` uses `try_write`, so readers cannot
//!   form a wait cycle with it.

use std::borrow::Cow;
use std::cell::RefCell;
use std::sync::{Arc, Weak};
use std::time::Duration;

use indexmap::IndexSet;
use palisade_config::{PalisadeConfig, RemovalConfig};
use palisade_types::{Declaration, InheritanceResolver, TypeName};
use palisade_worker::{DrainReport, PoolOptions, WorkerPool};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::lock::LockEntry;
use crate::{DeclarationSource, ModelError, ReadLock, TypeAdder};

/// Builder for [`LockingActionModel`].
pub struct ModelBuilder {
	adder: Arc<dyn TypeAdder>,
	source: Option<Arc<dyn DeclarationSource>>,
	removal: RemovalConfig,
}

impl ModelBuilder {
	/// Source consulted for dependencies that are not registered yet.
	#[must_use]
	pub fn source(mut self, source: Arc<dyn DeclarationSource>) -> Self {
		self.source = Some(source);
		self
	}

	/// Background removal pool settings.
	#[must_use]
	pub fn removal(mut self, removal: RemovalConfig) -> Self {
		self.removal = removal;
		self
	}

	/// Applies the relevant sections of a loaded configuration.
	#[must_use]
	pub fn config(self, config: &PalisadeConfig) -> Self {
		self.removal(config.removal.clone())
	}

	/// Starts the removal pool and returns the shared registry handle.
	///
	/// # Errors
	///
	/// Fails if the worker threads cannot be spawned.
	pub fn build(self) -> std::io::Result<Arc<LockingActionModel>> {
		let pool = WorkerPool::new(PoolOptions {
			workers: self.removal.workers,
			thread_name: self.removal.thread_name.clone(),
		})?;
		Ok(Arc::new(LockingActionModel {
			locks: Mutex::new(FxHashMap::default()),
			decls: RwLock::new(FxHashMap::default()),
			held: Mutex::new(FxHashMap::default()),
			adding: ReentrantMutex::new(RefCell::new(FxHashSet::default())),
			adder: self.adder,
			source: self.source,
			pool,
			drain_timeout: self.removal.drain_timeout(),
		}))
	}
}

/// Concurrent, reference-counted registry of declarations.
///
/// Instantiate one per backing store and share it through `Arc`.
pub struct LockingActionModel {
	/// Name to lock. Append-only.
	locks: Mutex<FxHashMap<TypeName, LockEntry>>,
	/// Name to the declaration as originally added (not flattened).
	decls: RwLock<FxHashMap<TypeName, Arc<Declaration>>>,
	/// Name to the read locks that declaration holds on its dependencies.
	held: Mutex<FxHashMap<TypeName, Vec<ReadLock>>>,
	/// Add monitor. Reentrant so `add` can add dependencies recursively; the
	/// set holds names whose add is in progress further up the stack.
	adding: ReentrantMutex<RefCell<FxHashSet<TypeName>>>,
	adder: Arc<dyn TypeAdder>,
	source: Option<Arc<dyn DeclarationSource>>,
	pool: WorkerPool,
	drain_timeout: Duration,
}

impl std::fmt::Debug for LockingActionModel {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LockingActionModel")
			.field("known", &self.decls.read().len())
			.field("locks", &self.locks.lock().len())
			.field("pool", &self.pool)
			.finish_non_exhaustive()
	}
}

impl LockingActionModel {
	pub fn builder(adder: Arc<dyn TypeAdder>) -> ModelBuilder {
		ModelBuilder {
			adder,
			source: None,
			removal: RemovalConfig::default(),
		}
	}

	/// Returns the lock entry for `name`, creating it if needed.
	fn lock_entry(&self, name: &TypeName) -> LockEntry {
		let mut locks = self.locks.lock();
		if let Some(entry) = locks.get(name) {
			return Arc::clone(entry);
		}
		let entry = LockEntry::default();
		locks.insert(name.clone(), Arc::clone(&entry));
		entry
	}

	/// Acquires a read lock on `name`, blocking while a removal of `name` is
	/// in progress.
	///
	/// The lock-table mutex is released before blocking. Concurrent callers
	/// for a new name always share one lock object.
	pub fn read_lock(&self, name: &TypeName) -> ReadLock {
		let entry = self.lock_entry(name);
		ReadLock::acquire(name.clone(), &entry)
	}

	/// Registers `decl` if its name is not already known.
	///
	/// Dependencies are read-locked first; any that are unknown are added
	/// from the configured [`DeclarationSource`]. Action-like declarations
	/// are flattened before being handed to the [`TypeAdder`]. The original
	/// declaration is recorded only after the adder accepts it.
	///
	/// # Errors
	///
	/// [`ModelError::Adder`] if the backing store refuses, [`ModelError::Source`]
	/// if a dependency lookup fails, [`ModelError::Types`] if the parent chain
	/// is broken or cyclic. Dependency locks taken for the failed add are
	/// released and dependencies it pulled from the source are evicted again.
	pub fn add(&self, decl: &Declaration) -> Result<(), ModelError> {
		let name = decl.name();
		let _own = self.read_lock(name);
		let adding = self.adding.lock();

		if self.is_known(name) {
			tracing::trace!(type_name = %name, "model.add.known");
			return Ok(());
		}
		if !adding.borrow_mut().insert(name.clone()) {
			tracing::trace!(type_name = %name, "model.add.in_progress");
			return Ok(());
		}

		let result = self.add_unknown(decl, &adding);
		adding.borrow_mut().remove(name);
		result
	}

	fn add_unknown(&self, decl: &Declaration, adding: &RefCell<FxHashSet<TypeName>>) -> Result<(), ModelError> {
		let mut pulled = Vec::new();
		let result = self.lock_and_add(decl, adding, &mut pulled);
		if result.is_err() && !pulled.is_empty() {
			// Dependencies fetched for this add would otherwise stay behind
			// unpinned, or pin this name without it ever being registered.
			let rolled_back = self.remove_until_fixpoint(pulled);
			tracing::debug!(type_name = %decl.name(), rolled_back, "model.add.rolled_back");
		}
		result
	}

	fn lock_and_add(&self, decl: &Declaration, adding: &RefCell<FxHashSet<TypeName>>, pulled: &mut Vec<TypeName>) -> Result<(), ModelError> {
		let name = decl.name();
		let required = decl.required_names();
		let mut dep_locks = Vec::with_capacity(required.len());

		for dep in &required {
			let lock = self.read_lock(dep);
			let pending = adding.borrow().contains(dep);
			if !pending && !self.is_known(dep) {
				self.add_from_source(name, dep)?;
				if self.is_known(dep) {
					pulled.push(dep.clone());
				}
			}
			dep_locks.push(lock);
		}

		let resolved = if decl.is_action() {
			Cow::Owned(self.flatten(decl)?)
		} else {
			Cow::Borrowed(decl)
		};
		self.adder.add(&resolved).map_err(|source| {
			tracing::debug!(type_name = %name, error = %source, "model.add.rejected");
			ModelError::Adder { name: name.clone(), source }
		})?;

		self.decls.write().insert(name.clone(), Arc::new(decl.clone()));
		tracing::debug!(type_name = %name, dependencies = dep_locks.len(), "model.add");
		self.held.lock().insert(name.clone(), dep_locks);
		Ok(())
	}

	fn add_from_source(&self, dependent: &TypeName, dep: &TypeName) -> Result<(), ModelError> {
		let Some(source) = &self.source else {
			return Ok(());
		};
		match source.declaration(dep) {
			Ok(Some(found)) => self.add(&found),
			Ok(None) => {
				tracing::debug!(type_name = %dep, dependent = %dependent, "model.add.dependency_unavailable");
				Ok(())
			}
			Err(source) => Err(ModelError::Source {
				dependent: dependent.clone(),
				name: dep.clone(),
				source,
			}),
		}
	}

	fn flatten(&self, decl: &Declaration) -> Result<Declaration, ModelError> {
		let mut resolver = InheritanceResolver::new(|name: &TypeName| self.get_raw(name));
		Ok(resolver.resolve(decl)?)
	}

	/// Removes `name` if nobody holds a read lock on it and the backing store
	/// agrees. Never blocks.
	///
	/// On success the read locks the declaration held on its dependencies are
	/// released, which may make those removable in turn. Backing-store errors
	/// are logged and reported as `false`.
	pub fn maybe_remove(&self, name: &TypeName) -> bool {
		self.try_remove(name).is_some()
	}

	/// Like [`Self::maybe_remove`], returning the names whose locks were released.
	fn try_remove(&self, name: &TypeName) -> Option<Vec<TypeName>> {
		if !self.is_known(name) {
			return None;
		}
		let entry = self.locks.lock().get(name).cloned()?;
		let Some(_write) = entry.try_write() else {
			tracing::trace!(type_name = %name, "model.remove.busy");
			return None;
		};

		// Another remover may have won between the check above and the lock.
		let decl = self.get_raw(name)?;
		match self.adder.remove(&decl) {
			Ok(true) => {}
			Ok(false) => {
				tracing::trace!(type_name = %name, "model.remove.declined");
				return None;
			}
			Err(err) => {
				tracing::warn!(type_name = %name, error = %err, "model.remove.failed");
				return None;
			}
		}

		self.decls.write().remove(name);
		let released = self.held.lock().remove(name).unwrap_or_default();
		tracing::debug!(type_name = %name, released = released.len(), "model.remove");
		Some(released.into_iter().map(ReadLock::release).collect())
	}

	/// Repeats [`Self::maybe_remove`] over `names` until a full pass removes
	/// nothing, returning how many were removed.
	///
	/// Dependencies released by a removal join the pass, so declarations that
	/// were only pulled in to satisfy a removed one are evicted as well.
	pub fn remove_until_fixpoint(&self, names: impl IntoIterator<Item = TypeName>) -> usize {
		let mut pending: IndexSet<TypeName> = names.into_iter().collect();
		let mut removed = 0;
		loop {
			let mut released = Vec::new();
			let before = removed;
			pending.retain(|name| match self.try_remove(name) {
				Some(deps) => {
					released.extend(deps);
					removed += 1;
					false
				}
				None => true,
			});
			pending.extend(released.into_iter().filter(|dep| self.is_known(dep)));
			if removed == before || pending.is_empty() {
				break;
			}
		}
		tracing::trace!(removed, remaining = pending.len(), "model.remove.fixpoint");
		removed
	}

	/// Schedules a background fixpoint removal over `decls`.
	///
	/// Fire-and-forget: the caller gets no result. After [`Self::shutdown`]
	/// the request is logged and dropped.
	pub fn maybe_remove_all<'a>(self: &Arc<Self>, decls: impl IntoIterator<Item = &'a Declaration>) {
		self.maybe_remove_names(decls.into_iter().map(|d| d.name().clone()).collect());
	}

	pub(crate) fn maybe_remove_names(self: &Arc<Self>, names: Vec<TypeName>) {
		if names.is_empty() {
			return;
		}
		let model: Weak<Self> = Arc::downgrade(self);
		let count = names.len();
		let submitted = self.pool.submit("model.remove_batch", move || {
			if let Some(model) = model.upgrade() {
				model.remove_until_fixpoint(names);
			}
		});
		if submitted.is_err() {
			tracing::warn!(count, "model.remove_batch.rejected");
		}
	}

	/// Declaration as originally added. The caller should hold a read lock on
	/// `name`.
	pub fn get_raw(&self, name: &TypeName) -> Option<Arc<Declaration>> {
		self.decls.read().get(name).cloned()
	}

	/// Flattened declaration, recomputed on every call. The caller should
	/// hold a read lock on `name`.
	///
	/// # Errors
	///
	/// [`ModelError::Types`] if an ancestor has since been removed or the
	/// chain is cyclic.
	pub fn get_inherited(&self, name: &TypeName) -> Result<Option<Declaration>, ModelError> {
		match self.get_raw(name) {
			Some(decl) => self.flatten(&decl).map(Some),
			None => Ok(None),
		}
	}

	pub fn is_known(&self, name: &TypeName) -> bool {
		self.decls.read().contains_key(name)
	}

	/// Registered names, sorted.
	pub fn known_names(&self) -> Vec<TypeName> {
		let mut names: Vec<_> = self.decls.read().keys().cloned().collect();
		names.sort();
		names
	}

	/// Names `name` currently holds read locks on.
	pub fn held_dependencies(&self, name: &TypeName) -> Vec<TypeName> {
		self.held
			.lock()
			.get(name)
			.map(|locks| locks.iter().map(|l| l.name().clone()).collect())
			.unwrap_or_default()
	}

	/// Number of lock-table entries ever created.
	pub fn lock_table_len(&self) -> usize {
		self.locks.lock().len()
	}

	/// Background removal batches queued or running.
	pub fn pending_removals(&self) -> usize {
		self.pool.pending()
	}

	/// Stops accepting background removals and drains queued ones within the
	/// configured timeout.
	pub fn shutdown(&self) -> DrainReport {
		self.pool.shutdown(self.drain_timeout)
	}
}
