//! Declaration data model for the locking action model.
//!
//! This crate owns the value types every other palisade crate passes around:
//!
//! * [`TypeName`]: the immutable key identifying a declaration
//! * [`TypeRef`]: a type as written in a declaration, possibly parameterized
//! * [`Declaration`]: a type, family, idiom, action or procedure
//! * [`InheritanceResolver`]: flattens action parent chains
//!
//! Nothing here is concurrent; locking lives in `palisade-action-model`.

mod decl;
mod error;
mod inherit;
mod name;

pub use decl::{DeclKind, Declaration, Parameter};
pub use error::{Result, TypesError};
pub use inherit::{InheritanceResolver, inherit};
pub use name::{CollectionKind, TypeName, TypeRef};
