//! Test doubles for the registry's collaborators.

use std::time::Duration;

use palisade_types::{Declaration, TypeName};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{AdderError, TypeAdder};

#[derive(Debug, Default)]
struct RecorderState {
	added: Vec<Declaration>,
	removed: Vec<TypeName>,
	add_counts: FxHashMap<TypeName, usize>,
	fail_add: FxHashSet<TypeName>,
	fail_remove: FxHashSet<TypeName>,
}

/// In-memory [`TypeAdder`] that records every call.
///
/// Failures can be injected per name. In "keep plain types" mode it declines
/// to forget anything that is not action-like, like stores that only track
/// actions dynamically.
#[derive(Debug, Default)]
pub struct RecordingAdder {
	state: Mutex<RecorderState>,
	keep_plain_types: bool,
	remove_delay: Option<Duration>,
}

impl RecordingAdder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Declines removal of non-action declarations.
	pub fn keeping_plain_types() -> Self {
		Self {
			keep_plain_types: true,
			..Self::default()
		}
	}

	/// Sleeps inside every `remove` call, widening the write-lock window.
	#[must_use]
	pub fn with_remove_delay(mut self, delay: Duration) -> Self {
		self.remove_delay = Some(delay);
		self
	}

	/// Makes `add` fail for `name` until cleared.
	pub fn fail_add_for(&self, name: &TypeName) {
		self.state.lock().fail_add.insert(name.clone());
	}

	/// Makes `remove` fail for `name` until cleared.
	pub fn fail_remove_for(&self, name: &TypeName) {
		self.state.lock().fail_remove.insert(name.clone());
	}

	pub fn clear_failures(&self) {
		let mut state = self.state.lock();
		state.fail_add.clear();
		state.fail_remove.clear();
	}

	/// Declarations passed to `add`, in call order.
	pub fn added(&self) -> Vec<Declaration> {
		self.state.lock().added.clone()
	}

	/// Names passed to a successful `remove`, in call order.
	pub fn removed(&self) -> Vec<TypeName> {
		self.state.lock().removed.clone()
	}

	/// Successful `add` calls for `name`.
	pub fn add_count(&self, name: &TypeName) -> usize {
		self.state.lock().add_counts.get(name).copied().unwrap_or(0)
	}
}

impl TypeAdder for RecordingAdder {
	fn add(&self, decl: &Declaration) -> Result<(), AdderError> {
		let mut state = self.state.lock();
		if state.fail_add.contains(decl.name()) {
			return Err(AdderError::Rejected {
				name: decl.name().clone(),
				reason: "injected failure".to_owned(),
			});
		}
		state.added.push(decl.clone());
		*state.add_counts.entry(decl.name().clone()).or_default() += 1;
		Ok(())
	}

	fn remove(&self, decl: &Declaration) -> Result<bool, AdderError> {
		if let Some(delay) = self.remove_delay {
			std::thread::sleep(delay);
		}
		let mut state = self.state.lock();
		if state.fail_remove.contains(decl.name()) {
			return Err(AdderError::Backend("injected failure".to_owned()));
		}
		if self.keep_plain_types && !decl.is_action() {
			return Ok(false);
		}
		state.removed.push(decl.name().clone());
		Ok(true)
	}
}
