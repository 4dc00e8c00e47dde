//! Time sources used for freshness decisions.

// self
use crate::_prelude::*;

/// Supplies the instant the cache treats as "now".
pub trait Clock
where
	Self: Send + Sync,
{
	/// Current UTC instant.
	fn now(&self) -> OffsetDateTime;
}

/// Wall-clock time source backed by [`OffsetDateTime::now_utc`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Manually driven time source for tests and simulations.
#[derive(Debug)]
pub struct ManualClock(Mutex<OffsetDateTime>);
impl ManualClock {
	/// Starts the clock at the provided instant.
	pub fn new(start: OffsetDateTime) -> Self {
		Self(Mutex::new(start))
	}

	/// Moves the clock forward (or backward for negative durations).
	pub fn advance(&self, by: Duration) {
		let mut now = self.0.lock();

		*now += by;
	}

	/// Pins the clock to an absolute instant.
	pub fn set(&self, instant: OffsetDateTime) {
		*self.0.lock() = instant;
	}
}
impl Default for ManualClock {
	fn default() -> Self {
		Self::new(OffsetDateTime::now_utc())
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.0.lock()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn manual_clock_only_moves_when_told() {
		let start = OffsetDateTime::UNIX_EPOCH;
		let clock = ManualClock::new(start);

		assert_eq!(clock.now(), start);

		clock.advance(Duration::minutes(5));

		assert_eq!(clock.now() - start, Duration::minutes(5));

		clock.set(start);

		assert_eq!(clock.now(), start);
	}
}
