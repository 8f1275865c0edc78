//! Bounded in-memory response cache with lazy TTL expiry and LRU eviction.
//!
//! Only successful responses to read requests land here. Mutating requests are never cached
//! and never invalidate other entries; staleness after a write is an accepted limitation.
//! Callers needing a fresh read bypass the cache explicitly on the request spec.

// std
use std::collections::{HashMap, VecDeque};
// crates.io
use http::StatusCode;
use serde_json::Value;
use tokio::sync::Mutex;
// self
use crate::{_prelude::*, cache::entry::CacheEntry, http::request::RequestSignature};

/// Signature-keyed response cache shared by all callers within a session.
///
/// LRU eviction is used rather than FIFO because read-heavy screens re-request the same small
/// set of endpoints; a lookup refreshes the entry's recency.
#[derive(Debug)]
pub struct ResponseCache {
	inner: Mutex<CacheInner>,
	capacity: usize,
	ttl: Duration,
}
impl ResponseCache {
	/// Create a cache bounded to `capacity` entries, each living for `ttl`.
	pub fn new(capacity: usize, ttl: Duration) -> Self {
		Self { inner: Mutex::new(CacheInner::default()), capacity, ttl }
	}

	/// Look up an unexpired entry, refreshing its recency on hit.
	///
	/// Expired entries are dropped on observation; no background sweep runs.
	pub async fn get(&self, signature: &RequestSignature) -> Option<(StatusCode, Arc<Value>)> {
		let now = Instant::now();
		let mut inner = self.inner.lock().await;
		let hit = match inner.entries.get(signature) {
			Some(entry) if entry.is_expired(now) => None,
			Some(entry) => Some((entry.status(), entry.body())),
			None => return None,
		};

		if hit.is_some() {
			inner.touch(signature);
		} else {
			inner.entries.remove(signature);
			inner.forget(signature);

			tracing::debug!(signature = signature.as_str(), "cache entry expired");
		}

		hit
	}

	/// Insert or overwrite an entry, evicting the least-recently-used one at capacity.
	pub async fn insert(&self, signature: RequestSignature, status: StatusCode, body: Arc<Value>) {
		let now = Instant::now();
		let entry = CacheEntry::new(status, body, self.ttl, now);
		let mut inner = self.inner.lock().await;

		if inner.entries.insert(signature.clone(), entry).is_none() {
			while inner.entries.len() > self.capacity {
				let Some(oldest) = inner.recency.pop_front() else { break };

				inner.entries.remove(&oldest);

				tracing::debug!(signature = oldest.as_str(), "evicted least-recently-used entry");
			}
		}

		inner.touch(&signature);
	}

	/// Drop every entry; called on logout so a new session never observes prior payloads.
	pub async fn clear(&self) {
		let mut inner = self.inner.lock().await;

		inner.entries.clear();
		inner.recency.clear();

		tracing::debug!("response cache cleared");
	}

	/// Number of entries currently held, expired or not.
	pub async fn len(&self) -> usize {
		self.inner.lock().await.entries.len()
	}

	/// Whether the cache currently holds no entries.
	pub async fn is_empty(&self) -> bool {
		self.inner.lock().await.entries.is_empty()
	}
}

#[derive(Debug, Default)]
struct CacheInner {
	entries: HashMap<RequestSignature, CacheEntry>,
	// Recency order, least-recently-used at the front. Holds exactly the keys of `entries`.
	recency: VecDeque<RequestSignature>,
}
impl CacheInner {
	fn touch(&mut self, signature: &RequestSignature) {
		self.forget(signature);
		self.recency.push_back(signature.clone());
	}

	fn forget(&mut self, signature: &RequestSignature) {
		self.recency.retain(|known| known != signature);
	}
}
