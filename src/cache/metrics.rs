// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for acquire outcomes.
#[derive(Debug, Default)]
pub struct CacheMetrics {
	hits: AtomicU64,
	refreshes: AtomicU64,
	failures: AtomicU64,
	timeouts: AtomicU64,
}
impl CacheMetrics {
	/// Acquires answered from a fresh entry (fast path or slow-path re-check).
	pub fn hits(&self) -> u64 {
		self.hits.load(Ordering::Relaxed)
	}

	/// Successful refreshes, i.e. completed handshakes that replaced the entry.
	pub fn refreshes(&self) -> u64 {
		self.refreshes.load(Ordering::Relaxed)
	}

	/// Refresh attempts that ended in a configuration or authentication error.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	/// Acquires abandoned because the caller's deadline elapsed.
	pub fn timeouts(&self) -> u64 {
		self.timeouts.load(Ordering::Relaxed)
	}

	pub(crate) fn record_hit(&self) {
		self.hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh(&self) {
		self.refreshes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_timeout(&self) {
		self.timeouts.fetch_add(1, Ordering::Relaxed);
	}
}
