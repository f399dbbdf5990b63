use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use palisade_action_model::LockingActionModel;
use palisade_config::FetchConfig;
use palisade_types::{Declaration, TypeName};
use parking_lot::Mutex;
use tokio::time::{Instant, timeout};

use crate::cache::TtlCache;
use crate::{ExecutorQuery, FetchError, FetchRequest, RequestId, TypeBus};

/// Resolves declarations by name: registry, then cache, then bus.
pub struct TypeFetcher {
	model: Arc<LockingActionModel>,
	bus: Arc<dyn TypeBus>,
	cache: Mutex<TtlCache>,
	next_id: AtomicU64,
	request_timeout: Duration,
	executor_window: Duration,
}

impl std::fmt::Debug for TypeFetcher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TypeFetcher")
			.field("cached", &self.cached_len())
			.field("request_timeout", &self.request_timeout)
			.field("executor_window", &self.executor_window)
			.finish_non_exhaustive()
	}
}

impl TypeFetcher {
	pub fn new(model: Arc<LockingActionModel>, bus: Arc<dyn TypeBus>, config: &FetchConfig) -> Self {
		Self {
			model,
			bus,
			cache: Mutex::new(TtlCache::new(config.cache_capacity, config.cache_ttl())),
			next_id: AtomicU64::new(1),
			request_timeout: config.request_timeout(),
			executor_window: config.executor_window(),
		}
	}

	fn next_id(&self) -> RequestId {
		self.next_id.fetch_add(1, Ordering::Relaxed)
	}

	/// Looks `name` up. `Ok(None)` means nobody knows it.
	///
	/// Only found declarations are cached, so a name that appears remotely
	/// later is picked up on the next call.
	///
	/// # Errors
	///
	/// [`FetchError::Timeout`] if the bus round trip exceeds the request
	/// deadline; [`FetchError::Bus`] if delivery fails or the response does not
	/// match the request.
	pub async fn fetch(&self, name: &TypeName) -> Result<Option<Arc<Declaration>>, FetchError> {
		if let Some(decl) = self.model.get_raw(name) {
			tracing::trace!(%name, "fetch.model");
			return Ok(Some(decl));
		}

		let cached = self.cache.lock().get(name, Instant::now());
		if let Some(decl) = cached {
			tracing::trace!(%name, "fetch.cache");
			return Ok(Some(decl));
		}

		let id = self.next_id();
		let request = FetchRequest { id, name: name.clone() };
		let response = timeout(self.request_timeout, self.bus.request(request))
			.await
			.map_err(|_| {
				tracing::debug!(%name, id, "fetch.timeout");
				FetchError::Timeout {
					operation: "fetch",
					after: self.request_timeout,
				}
			})??;

		if response.id != id {
			return Err(FetchError::Bus(format!("response {} does not answer request {id}", response.id)));
		}
		let Some(decl) = response.declaration else {
			tracing::debug!(%name, "fetch.not_found");
			return Ok(None);
		};
		if decl.name() != name {
			return Err(FetchError::Bus(format!("asked for {name}, got {}", decl.name())));
		}

		tracing::debug!(%name, "fetch.remote");
		let decl = Arc::new(decl);
		self.cache.lock().insert(name.clone(), Arc::clone(&decl), Instant::now());
		Ok(Some(decl))
	}

	/// Asks the bus whether any executor can run `action`.
	///
	/// Replies are collected until one is positive, the reply stream ends or
	/// the executor window closes. Silence is `Ok(false)`, not an error.
	///
	/// # Errors
	///
	/// [`FetchError::Bus`] if the query cannot be published;
	/// [`FetchError::Timeout`] if publishing itself exceeds the request deadline.
	pub async fn executors_exist(&self, action: &TypeName) -> Result<bool, FetchError> {
		let id = self.next_id();
		let query = ExecutorQuery { id, action: action.clone() };
		let mut replies = timeout(self.request_timeout, self.bus.broadcast(query))
			.await
			.map_err(|_| FetchError::Timeout {
				operation: "executor query",
				after: self.request_timeout,
			})??;

		let window = tokio::time::sleep(self.executor_window);
		tokio::pin!(window);
		loop {
			tokio::select! {
				reply = replies.recv() => match reply {
					Some(reply) if reply.id == id && reply.available => {
						tracing::debug!(%action, executor = %reply.executor, "fetch.executors.found");
						return Ok(true);
					}
					Some(_) => {}
					None => break,
				},
				() = &mut window => {
					tracing::trace!(%action, "fetch.executors.window_closed");
					break;
				}
			}
		}
		tracing::debug!(%action, "fetch.executors.none");
		Ok(false)
	}

	/// Drops the cached entry for `name`. Returns true if there was one.
	pub fn invalidate(&self, name: &TypeName) -> bool {
		self.cache.lock().invalidate(name)
	}

	pub fn clear(&self) {
		self.cache.lock().clear();
	}

	/// Number of cached declarations, fresh or not yet swept.
	pub fn cached_len(&self) -> usize {
		self.cache.lock().len()
	}
}

#[cfg(test)]
mod tests;
