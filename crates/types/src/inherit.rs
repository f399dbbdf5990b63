//! Parent-chain flattening for action declarations.
//!
//! A flattened action lists its parent's inputs, its own inputs, its parent's
//! outputs, then its own outputs. Invocation matches arguments by position,
//! so this order must not change. Properties are the parent's overlaid by the
//! child's.

use std::sync::Arc;

use indexmap::IndexSet;
use rustc_hash::FxHashMap;

use crate::{Declaration, Result, TypeName, TypesError};

/// Flattens `child` over an already flattened `parent`.
pub fn inherit(child: &Declaration, parent: &Declaration) -> Declaration {
	child.clone().into_flattened(parent)
}

/// Memoized top-down walk over parent names.
///
/// Parents are fetched by name through `lookup`, so the resolver never holds
/// live references into whatever map backs it. Results are memoized for the
/// lifetime of the resolver; create a fresh one per lookup batch.
pub struct InheritanceResolver<F> {
	lookup: F,
	memo: FxHashMap<TypeName, Declaration>,
	resolving: IndexSet<TypeName>,
}

impl<F> InheritanceResolver<F>
where
	F: FnMut(&TypeName) -> Option<Arc<Declaration>>,
{
	pub fn new(lookup: F) -> Self {
		Self {
			lookup,
			memo: FxHashMap::default(),
			resolving: IndexSet::new(),
		}
	}

	/// Returns the flattened form of `decl`.
	///
	/// Non-action declarations and actions without a parent resolve to a copy
	/// of themselves.
	///
	/// # Errors
	///
	/// [`TypesError::InheritanceCycle`] if the parent chain revisits a name,
	/// [`TypesError::MissingParent`] if `lookup` cannot supply an ancestor.
	pub fn resolve(&mut self, decl: &Declaration) -> Result<Declaration> {
		if !decl.is_action() {
			return Ok(decl.clone());
		}
		let Some(parent_name) = decl.parent() else {
			return Ok(decl.clone());
		};
		if let Some(done) = self.memo.get(decl.name()) {
			return Ok(done.clone());
		}

		if let Some(start) = self.resolving.get_index_of(decl.name()) {
			let mut chain: Vec<TypeName> = self.resolving.iter().skip(start).cloned().collect();
			chain.push(decl.name().clone());
			return Err(TypesError::InheritanceCycle { chain });
		}
		if parent_name == decl.name() {
			return Err(TypesError::InheritanceCycle {
				chain: vec![decl.name().clone(), decl.name().clone()],
			});
		}

		self.resolving.insert(decl.name().clone());
		let flat_parent = match (self.lookup)(parent_name) {
			Some(parent) => self.resolve(&parent),
			None => Err(TypesError::MissingParent {
				child: decl.name().clone(),
				parent: parent_name.clone(),
			}),
		};
		self.resolving.pop();

		let flat = inherit(decl, &flat_parent?);
		self.memo.insert(decl.name().clone(), flat.clone());
		Ok(flat)
	}
}
