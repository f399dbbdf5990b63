//! Error types for the locking action model.

use palisade_types::{TypeName, TypesError};
use thiserror::Error;

/// Failure reported by a [`TypeAdder`](crate::TypeAdder).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdderError {
	/// The backing store refused the declaration.
	#[error("{name} rejected by backing store: {reason}")]
	Rejected {
		/// Declaration that was refused.
		name: TypeName,
		/// Store-supplied explanation.
		reason: String,
	},

	/// The backing store could not be reached or failed internally.
	#[error("backing store failure: {0}")]
	Backend(String),
}

/// Failure reported by a [`DeclarationSource`](crate::DeclarationSource).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("declaration source failed for {name}: {reason}")]
pub struct SourceError {
	/// Name being looked up.
	pub name: TypeName,
	/// What went wrong.
	pub reason: String,
}

/// A dependency finder could not enumerate what an object needs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
	/// The finder failed on its own terms.
	#[error("dependency resolution failed: {0}")]
	Failed(String),

	/// A lookup performed by the finder failed.
	#[error(transparent)]
	Source(#[from] SourceError),
}

/// Failure returned by a [`LockedAction`](crate::LockedAction) body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ActionError(pub String);

impl ActionError {
	pub fn new(message: impl Into<String>) -> Self {
		Self(message.into())
	}
}

/// Errors from [`LockingActionModel`](crate::LockingActionModel) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
	/// The backing store rejected an add. Nothing was recorded.
	#[error("unable to add {name}")]
	Adder {
		/// Declaration being added.
		name: TypeName,
		#[source]
		source: AdderError,
	},

	/// A dependency could not be looked up.
	#[error("unable to look up {name}, required by {dependent}")]
	Source {
		/// Declaration whose dependency was being resolved.
		dependent: TypeName,
		/// The dependency.
		name: TypeName,
		#[source]
		source: SourceError,
	},

	/// Inheritance flattening failed.
	#[error(transparent)]
	Types(#[from] TypesError),
}

/// Why a locked action could not start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
	#[error(transparent)]
	Resolution(#[from] ResolutionError),

	#[error(transparent)]
	Model(#[from] ModelError),
}

/// Errors from [`WithLockedTypes::locked_action`](crate::WithLockedTypes::locked_action).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockedActionError {
	/// Dependencies could not be found, locked or registered. Cleanup has run.
	#[error("unable to start {action}")]
	Start {
		/// Name of the action.
		action: String,
		#[source]
		source: StartError,
	},

	/// The action body failed. Cleanup has run.
	#[error("{action} failed")]
	Action {
		/// Name of the action.
		action: String,
		#[source]
		source: ActionError,
	},
}
