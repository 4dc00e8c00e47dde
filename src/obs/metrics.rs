// self
use crate::obs::{AcquireOutcome, AcquirePath};

/// Records an acquire outcome via the global metrics recorder (when enabled).
pub fn record_acquire_outcome(path: AcquirePath, outcome: AcquireOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"iam_session_cache_acquire_total",
			"path" => path.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (path, outcome);
	}
}
