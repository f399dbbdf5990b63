use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use palisade_types::{Declaration, TypeName};
use tokio::time::Instant;

struct Entry {
	decl: Arc<Declaration>,
	expires_at: Instant,
}

/// Bounded LRU of fetched declarations; entries expire `ttl` after insertion.
pub(crate) struct TtlCache {
	entries: LruCache<TypeName, Entry>,
	ttl: Duration,
}

impl TtlCache {
	pub(crate) fn new(capacity: usize, ttl: Duration) -> Self {
		let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
		Self {
			entries: LruCache::new(capacity),
			ttl,
		}
	}

	/// Fresh entry for `name`. Expired entries are dropped on the way.
	pub(crate) fn get(&mut self, name: &TypeName, now: Instant) -> Option<Arc<Declaration>> {
		let expired = match self.entries.get(name) {
			Some(entry) if entry.expires_at > now => return Some(Arc::clone(&entry.decl)),
			Some(_) => true,
			None => false,
		};
		if expired {
			self.entries.pop(name);
		}
		None
	}

	pub(crate) fn insert(&mut self, name: TypeName, decl: Arc<Declaration>, now: Instant) {
		let expires_at = now + self.ttl;
		self.entries.put(name, Entry { decl, expires_at });
	}

	pub(crate) fn invalidate(&mut self, name: &TypeName) -> bool {
		self.entries.pop(name).is_some()
	}

	pub(crate) fn clear(&mut self) {
		self.entries.clear();
	}

	pub(crate) fn len(&self) -> usize {
		self.entries.len()
	}
}
