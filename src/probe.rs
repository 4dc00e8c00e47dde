//! Authentication prober: bounded retries that turn a credential strategy into a usable token.
//!
//! The prober calls [`CredentialStrategy::access_token`] until it returns a non-empty token
//! or the [`RetryPolicy`] budget runs out. An `Ok` carrying an empty token counts as a failed
//! attempt. Backoff sleeps happen between attempts, never after the last one.

// crates.io
use rand::Rng;
// self
use crate::{
	_prelude::*,
	auth::{CredentialStrategy, TokenSecret},
	error::{AuthenticationCause, AuthenticationError},
};

/// Delay schedule applied between failed attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backoff {
	/// Same delay after every failure.
	Fixed(StdDuration),
	/// Doubling delay starting at `initial`, capped at `max`.
	Exponential {
		/// Delay after the first failure.
		initial: StdDuration,
		/// Upper bound for any single delay.
		max: StdDuration,
	},
}
impl Backoff {
	/// Delay to wait after the given (1-based) failed attempt, before jitter.
	pub fn delay_after(&self, attempt: u32) -> StdDuration {
		match *self {
			Self::Fixed(delay) => delay,
			Self::Exponential { initial, max } => {
				let exponent = attempt.saturating_sub(1).min(16);

				initial.saturating_mul(1 << exponent).min(max)
			},
		}
	}
}

/// Retry budget used by the [`Prober`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Total attempts, including the first one. Never below 1.
	pub max_attempts: u32,
	/// Delay schedule between attempts.
	pub backoff: Backoff,
	/// Upper bound of a uniformly random delay added to each backoff.
	pub jitter: StdDuration,
}
impl RetryPolicy {
	/// Default number of attempts.
	pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
	/// Default fixed delay between attempts.
	pub const DEFAULT_BACKOFF: StdDuration = StdDuration::from_millis(100);

	/// Single attempt, no waiting.
	pub fn no_retry() -> Self {
		Self { max_attempts: 1, ..Self::default() }
	}

	/// Overrides the attempt budget (clamped to at least one attempt).
	pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
		self.max_attempts = max_attempts.max(1);

		self
	}

	/// Overrides the delay schedule.
	pub fn with_backoff(mut self, backoff: Backoff) -> Self {
		self.backoff = backoff;

		self
	}

	/// Adds up to `jitter` of random delay to each backoff.
	pub fn with_jitter(mut self, jitter: StdDuration) -> Self {
		self.jitter = jitter;

		self
	}

	/// Full delay (schedule plus jitter) after the given failed attempt.
	pub fn delay_after(&self, attempt: u32) -> StdDuration {
		let base = self.backoff.delay_after(attempt);

		if self.jitter.is_zero() {
			return base;
		}

		let max_nanos = u64::try_from(self.jitter.as_nanos()).unwrap_or(u64::MAX);

		base.saturating_add(StdDuration::from_nanos(rand::rng().random_range(0..=max_nanos)))
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
			backoff: Backoff::Fixed(Self::DEFAULT_BACKOFF),
			jitter: StdDuration::ZERO,
		}
	}
}

/// Successful probe outcome.
#[derive(Clone, Debug)]
pub struct ProbeReport {
	/// First usable token returned by the strategy.
	pub token: TokenSecret,
	/// Number of attempts it took, including the successful one.
	pub attempts: u32,
}

/// Exercises a credential strategy under a [`RetryPolicy`].
#[derive(Clone, Debug, Default)]
pub struct Prober {
	policy: RetryPolicy,
}
impl Prober {
	/// Creates a prober with the provided policy.
	pub fn new(policy: RetryPolicy) -> Self {
		Self { policy }
	}

	/// Requests tokens until one is usable or the budget is exhausted.
	pub async fn probe(&self, strategy: &dyn CredentialStrategy) -> Result<ProbeReport> {
		let max_attempts = self.policy.max_attempts.max(1);
		let mut cause = AuthenticationCause::EmptyToken;

		for attempt in 1..=max_attempts {
			match strategy.access_token().await {
				Ok(token) if !token.is_empty() => {
					#[cfg(feature = "tracing")]
					tracing::debug!(
						attempt,
						kind = strategy.kind().as_str(),
						"authentication probe succeeded"
					);

					return Ok(ProbeReport { token, attempts: attempt });
				},
				Ok(_) => {
					#[cfg(feature = "tracing")]
					tracing::warn!(
						attempt,
						max_attempts,
						"authentication probe returned an empty token"
					);

					cause = AuthenticationCause::EmptyToken;
				},
				Err(err) => {
					#[cfg(feature = "tracing")]
					tracing::warn!(
						attempt,
						max_attempts,
						error = %err,
						"authentication probe failed"
					);

					cause = AuthenticationCause::Failed(Box::new(err));
				},
			}

			if attempt < max_attempts {
				tokio::time::sleep(self.policy.delay_after(attempt)).await;
			}
		}

		Err(AuthenticationError { attempts: max_attempts, cause }.into())
	}
}
