//! Locking action-model registry.
//!
//! [`LockingActionModel`] is the authoritative in-memory catalog of
//! declarations shared by every session in a process. Each name has an
//! advisory reader/writer lock:
//!
//! * users of a declaration hold a [`ReadLock`] on it
//! * a registered declaration holds read locks on everything it requires, so
//!   dependencies outlive their dependents
//! * removal only ever *tries* the write lock, so it fails fast instead of
//!   waiting on readers, and never deadlocks with them
//!
//! [`WithLockedTypes`] wraps the whole protocol: find an object's
//! dependencies, lock and register them, run an action, then release and
//! opportunistically evict.
//!
//! The backing store is reached only through [`TypeAdder`]; unknown
//! dependencies are looked up through an optional [`DeclarationSource`].

mod adder;
mod error;
mod lock;
mod locked;
mod model;
mod source;
pub mod test_helpers;

pub use adder::TypeAdder;
pub use error::{ActionError, AdderError, LockedActionError, ModelError, ResolutionError, SourceError, StartError};
pub use lock::ReadLock;
pub use locked::{Cleanup, DependencyFinder, FnDependencyFinder, FnLockedAction, LockedAction, WithLockedTypes};
pub use model::{LockingActionModel, ModelBuilder};
pub use palisade_types::{Declaration, TypeName};
pub use palisade_worker::DrainReport;
pub use source::{Catalog, DeclarationSource};
