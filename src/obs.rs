//! Optional observability helpers for the connection cache.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to wrap refreshes in spans named `iam_session_cache.acquire` with the
//!   `path` and `config` (fingerprint) fields, and to log prober attempts.
//! - Enable `metrics` to increment the `iam_session_cache_acquire_total` counter for every
//!   acquire, labeled by `path` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

/// Code path an acquire call resolved on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AcquirePath {
	/// Shared-lock check found a fresh entry.
	FastPath,
	/// Exclusive-lock path (re-check and, if still stale, refresh).
	SlowPath,
}
impl AcquirePath {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			AcquirePath::FastPath => "fast_path",
			AcquirePath::SlowPath => "slow_path",
		}
	}
}

/// Outcome labels recorded for each acquire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AcquireOutcome {
	/// A fresh cached handle was returned.
	Hit,
	/// This caller refreshed the entry.
	Refreshed,
	/// Configuration or authentication failure propagated back to the caller.
	Failure,
	/// The caller's deadline elapsed.
	Timeout,
}
impl AcquireOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			AcquireOutcome::Hit => "hit",
			AcquireOutcome::Refreshed => "refreshed",
			AcquireOutcome::Failure => "failure",
			AcquireOutcome::Timeout => "timeout",
		}
	}
}
