use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{ExecutorQuery, ExecutorReply, FetchError, FetchRequest, FetchResponse};

/// Transport between a [`TypeFetcher`](crate::TypeFetcher) and the peers
/// that know about types and executors.
///
/// Implementations deliver messages; deadlines are enforced by the caller.
#[async_trait]
pub trait TypeBus: Send + Sync {
	/// Sends `request` and waits for the matching response.
	async fn request(&self, request: FetchRequest) -> Result<FetchResponse, FetchError>;

	/// Publishes `query` and returns a stream of replies.
	///
	/// The stream ends when no further replies can arrive.
	async fn broadcast(&self, query: ExecutorQuery) -> Result<mpsc::UnboundedReceiver<ExecutorReply>, FetchError>;
}
