use palisade_types::{Declaration, TypeName};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::SourceError;

/// Where the registry finds declarations for dependencies it must add itself.
pub trait DeclarationSource: Send + Sync {
	/// Looks up `name`. `Ok(None)` means the source does not know it.
	fn declaration(&self, name: &TypeName) -> Result<Option<Declaration>, SourceError>;
}

/// In-memory declaration source.
#[derive(Debug, Default)]
pub struct Catalog {
	decls: RwLock<FxHashMap<TypeName, Declaration>>,
}

impl Catalog {
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts or replaces a declaration.
	pub fn insert(&self, decl: Declaration) {
		self.decls.write().insert(decl.name().clone(), decl);
	}

	/// Removes a declaration, returning it if present.
	pub fn remove(&self, name: &TypeName) -> Option<Declaration> {
		self.decls.write().remove(name)
	}

	pub fn len(&self) -> usize {
		self.decls.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.decls.read().is_empty()
	}
}

impl FromIterator<Declaration> for Catalog {
	fn from_iter<I: IntoIterator<Item = Declaration>>(iter: I) -> Self {
		Self {
			decls: RwLock::new(iter.into_iter().map(|d| (d.name().clone(), d)).collect()),
		}
	}
}

impl DeclarationSource for Catalog {
	fn declaration(&self, name: &TypeName) -> Result<Option<Declaration>, SourceError> {
		Ok(self.decls.read().get(name).cloned())
	}
}
