use palisade_types::Declaration;

use crate::AdderError;

/// Side-effecting registration against the backing store.
///
/// Called from inside the registry's critical sections: `add` under the add
/// monitor and `remove` while the name's write lock is held. Slow
/// implementations stall other adders and readers of that name.
pub trait TypeAdder: Send + Sync {
	/// Registers `decl`. Action-like declarations arrive already flattened.
	fn add(&self, decl: &Declaration) -> Result<(), AdderError>;

	/// Asks the store to forget `decl`.
	///
	/// Returns `Ok(false)` if the store chooses to keep it; the registry then
	/// keeps it too.
	fn remove(&self, decl: &Declaration) -> Result<bool, AdderError>;
}
