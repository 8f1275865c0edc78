//! Client telemetry bookkeeping.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::_prelude::*;

/// Thread-safe counters accumulated across a client session.
#[derive(Debug, Default)]
pub struct ClientMetrics {
	total_requests: AtomicU64,
	cache_hits: AtomicU64,
	refresh_successes: AtomicU64,
	refresh_errors: AtomicU64,
	last_refresh_micros: AtomicU64,
}
impl ClientMetrics {
	/// Create a new metrics accumulator.
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Record a request served from the response cache.
	pub fn record_hit(&self) {
		self.total_requests.fetch_add(1, Ordering::Relaxed);
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	/// Record a request that required a network dispatch.
	pub fn record_miss(&self) {
		self.total_requests.fetch_add(1, Ordering::Relaxed);
	}

	/// Record a successful token refresh and its latency.
	pub fn record_refresh_success(&self, duration: Duration) {
		self.refresh_successes.fetch_add(1, Ordering::Relaxed);
		self.last_refresh_micros.store(duration.as_micros() as u64, Ordering::Relaxed);
	}

	/// Record a failed token refresh.
	pub fn record_refresh_error(&self) {
		self.refresh_errors.fetch_add(1, Ordering::Relaxed);
	}

	/// Take a point-in-time snapshot for status reporting.
	pub fn snapshot(&self) -> ClientMetricsSnapshot {
		ClientMetricsSnapshot {
			total_requests: self.total_requests.load(Ordering::Relaxed),
			cache_hits: self.cache_hits.load(Ordering::Relaxed),
			refresh_successes: self.refresh_successes.load(Ordering::Relaxed),
			refresh_errors: self.refresh_errors.load(Ordering::Relaxed),
			last_refresh_micros: match self.last_refresh_micros.load(Ordering::Relaxed) {
				0 => None,
				value => Some(value),
			},
		}
	}
}

/// Read-only snapshot of session telemetry counters.
#[derive(Clone, Debug)]
pub struct ClientMetricsSnapshot {
	/// Total number of requests routed through the pipeline.
	pub total_requests: u64,
	/// Count of requests served from the response cache.
	pub cache_hits: u64,
	/// Count of successful token refresh operations.
	pub refresh_successes: u64,
	/// Count of token refresh attempts that resulted in errors.
	pub refresh_errors: u64,
	/// Microsecond latency of the most recent successful refresh.
	pub last_refresh_micros: Option<u64>,
}
impl ClientMetricsSnapshot {
	/// Convenience method to compute the cache hit rate.
	pub fn hit_rate(&self) -> f64 {
		if self.total_requests == 0 {
			0.0
		} else {
			self.cache_hits as f64 / self.total_requests as f64
		}
	}
}
