//! Messages exchanged over a [`TypeBus`](crate::TypeBus).

use palisade_types::{Declaration, TypeName};
use serde::{Deserialize, Serialize};

/// Correlates a reply with the message that caused it.
pub type RequestId = u64;

/// Asks for the declaration of `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
	pub id: RequestId,
	pub name: TypeName,
}

/// Answer to a [`FetchRequest`]. `declaration` is absent if the name is unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponse {
	pub id: RequestId,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub declaration: Option<Declaration>,
}

impl FetchResponse {
	pub fn found(id: RequestId, declaration: Declaration) -> Self {
		Self {
			id,
			declaration: Some(declaration),
		}
	}

	pub fn not_found(id: RequestId) -> Self {
		Self { id, declaration: None }
	}
}

/// Broadcast asking whether anyone can execute `action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorQuery {
	pub id: RequestId,
	pub action: TypeName,
}

/// One executor's answer to an [`ExecutorQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorReply {
	pub id: RequestId,
	pub executor: String,
	pub available: bool,
}
