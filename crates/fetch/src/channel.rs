//! In-process [`TypeBus`] over tokio channels.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::{ExecutorQuery, ExecutorReply, FetchError, FetchRequest, FetchResponse, TypeBus};

/// A message as seen by the [`Responder`].
#[derive(Debug)]
pub enum BusMessage {
	/// Answer through `reply`. Dropping it fails the request with a bus error.
	Fetch {
		request: FetchRequest,
		reply: oneshot::Sender<FetchResponse>,
	},
	/// Send zero or more replies, then drop `replies` to end the stream.
	ExecutorQuery {
		query: ExecutorQuery,
		replies: mpsc::UnboundedSender<ExecutorReply>,
	},
}

/// Requester side of an in-process bus.
#[derive(Debug, Clone)]
pub struct ChannelBus {
	tx: mpsc::UnboundedSender<BusMessage>,
}

/// Responder side of a [`ChannelBus`].
#[derive(Debug)]
pub struct Responder {
	rx: mpsc::UnboundedReceiver<BusMessage>,
}

impl ChannelBus {
	pub fn new() -> (Self, Responder) {
		let (tx, rx) = mpsc::unbounded_channel();
		(Self { tx }, Responder { rx })
	}

	fn send(&self, message: BusMessage) -> Result<(), FetchError> {
		self.tx.send(message).map_err(|_| FetchError::Bus("responder is gone".to_owned()))
	}
}

#[async_trait]
impl TypeBus for ChannelBus {
	async fn request(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
		let id = request.id;
		let (reply, response) = oneshot::channel();
		self.send(BusMessage::Fetch { request, reply })?;
		response.await.map_err(|_| FetchError::Bus(format!("request {id} dropped without a response")))
	}

	async fn broadcast(&self, query: ExecutorQuery) -> Result<mpsc::UnboundedReceiver<ExecutorReply>, FetchError> {
		let (replies, stream) = mpsc::unbounded_channel();
		self.send(BusMessage::ExecutorQuery { query, replies })?;
		Ok(stream)
	}
}

impl Responder {
	/// Next message, or `None` once every [`ChannelBus`] clone is dropped.
	pub async fn recv(&mut self) -> Option<BusMessage> {
		self.rx.recv().await
	}

	/// Handles every message with `handler` on a spawned task until the bus closes.
	pub fn serve<H>(mut self, mut handler: H) -> JoinHandle<()>
	where
		H: FnMut(BusMessage) + Send + 'static,
	{
		tokio::spawn(async move {
			while let Some(message) = self.rx.recv().await {
				handler(message);
			}
			tracing::trace!("fetch.bus.closed");
		})
	}
}
