use std::time::Duration;

/// Failure while resolving a name or querying executors.
///
/// No retries are attempted; callers decide whether to ask again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
	/// No response arrived within the configured deadline.
	#[error("{operation} timed out after {after:?}")]
	Timeout { operation: &'static str, after: Duration },
	/// The bus could not deliver the message or returned garbage.
	#[error("bus error: {0}")]
	Bus(String),
}
