//! Error types for the declaration model.

use thiserror::Error;

use crate::TypeName;

/// Errors raised while parsing names or flattening declarations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
	/// A type name could not be parsed.
	#[error("invalid type name {input:?}: {reason}")]
	InvalidName {
		/// The rejected text.
		input: String,
		/// What was wrong with it.
		reason: &'static str,
	},

	/// A type reference could not be parsed.
	#[error("invalid type reference {input:?}: {reason}")]
	InvalidTypeRef {
		/// The rejected text.
		input: String,
		/// What was wrong with it.
		reason: &'static str,
	},

	/// An action's parent chain loops back on itself.
	#[error("inheritance cycle: {}", format_chain(.chain))]
	InheritanceCycle {
		/// Names along the cycle, starting and ending with the repeated name.
		chain: Vec<TypeName>,
	},

	/// An action names a parent that is not available.
	#[error("{child} inherits from unknown parent {parent}")]
	MissingParent {
		/// The declaration being flattened.
		child: TypeName,
		/// The parent that could not be found.
		parent: TypeName,
	},
}

fn format_chain(chain: &[TypeName]) -> String {
	chain.iter().map(ToString::to_string).collect::<Vec<_>>().join(" -> ")
}

/// Result type for declaration model operations.
pub type Result<T> = std::result::Result<T, TypesError>;
