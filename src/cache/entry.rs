//! Cache entry definitions.

// crates.io
use http::StatusCode;
use serde_json::Value;
// self
use crate::_prelude::*;

/// A cached response payload together with its expiry bookkeeping.
///
/// Entries are owned exclusively by the response cache; callers receive shared handles to the
/// payload, never the entry itself.
#[derive(Clone, Debug)]
pub struct CacheEntry {
	status: StatusCode,
	body: Arc<Value>,
	expires_at: Instant,
	stored_at: DateTime<Utc>,
}
impl CacheEntry {
	/// Create an entry expiring `ttl` after `now`.
	pub fn new(status: StatusCode, body: Arc<Value>, ttl: Duration, now: Instant) -> Self {
		Self { status, body, expires_at: now + ttl, stored_at: Utc::now() }
	}

	/// HTTP status of the cached response.
	pub fn status(&self) -> StatusCode {
		self.status
	}

	/// Shared handle to the cached payload.
	pub fn body(&self) -> Arc<Value> {
		self.body.clone()
	}

	/// Whether the entry has exceeded its freshness window.
	pub fn is_expired(&self, now: Instant) -> bool {
		now >= self.expires_at
	}

	/// Monotonic deadline after which the entry is ignored.
	pub fn expires_at(&self) -> Instant {
		self.expires_at
	}

	/// Wall-clock timestamp recorded when the entry was stored.
	pub fn stored_at(&self) -> DateTime<Utc> {
		self.stored_at
	}
}
