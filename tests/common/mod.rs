//! Scripted bootstrap fakes shared by the integration tests.

#![allow(dead_code)]

// std
use std::{
	collections::VecDeque,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration as StdDuration,
};
// crates.io
use parking_lot::Mutex;
// self
use iam_session_cache::{
	ClientCredentials, Configuration, Error, Result, TokenSecret,
	bootstrap::{BootstrapChannel, BootstrapConnector, BootstrapFuture, ExchangeRequest},
};

pub const BASE_ADDRESS: &str = "https://api.example.test";

/// One scripted response from the fake token endpoint.
#[derive(Clone, Copy, Debug)]
pub enum Step {
	/// Successful exchange yielding this token.
	Token(&'static str),
	/// Successful exchange yielding an empty token.
	Empty,
	/// Failed exchange.
	Fail(&'static str),
}

/// Bootstrap channel that replays a script and counts exchanges.
///
/// Once the script runs out the final step repeats.
pub struct ScriptedChannel {
	steps: Mutex<VecDeque<Step>>,
	last: Mutex<Step>,
	delay: StdDuration,
	exchanges: AtomicUsize,
}
impl ScriptedChannel {
	pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
		let steps: VecDeque<Step> = steps.into_iter().collect();
		let last = steps.back().copied().unwrap_or(Step::Fail("empty script"));

		Self {
			steps: Mutex::new(steps),
			last: Mutex::new(last),
			delay: StdDuration::ZERO,
			exchanges: AtomicUsize::new(0),
		}
	}

	/// Sleeps before answering so concurrent callers overlap.
	pub fn with_delay(mut self, delay: StdDuration) -> Self {
		self.delay = delay;

		self
	}

	/// Appends steps to the script (used to "repair" a failing endpoint).
	pub fn push(&self, steps: impl IntoIterator<Item = Step>) {
		let mut queue = self.steps.lock();

		queue.extend(steps);

		if let Some(last) = queue.back() {
			*self.last.lock() = *last;
		}
	}

	pub fn exchanges(&self) -> usize {
		self.exchanges.load(Ordering::SeqCst)
	}

	fn next_step(&self) -> Step {
		self.steps.lock().pop_front().unwrap_or_else(|| *self.last.lock())
	}
}
impl BootstrapChannel for ScriptedChannel {
	fn exchange<'a>(&'a self, request: &'a ExchangeRequest) -> BootstrapFuture<'a, TokenSecret> {
		Box::pin(async move {
			self.exchanges.fetch_add(1, Ordering::SeqCst);

			if !self.delay.is_zero() {
				tokio::time::sleep(self.delay).await;
			}

			match self.next_step() {
				Step::Token(token) => Ok(TokenSecret::new(token)),
				Step::Empty => Ok(TokenSecret::default()),
				Step::Fail(reason) => Err(Error::InvalidClient {
					reason: format!("{reason} for {}", request.client_id),
				}),
			}
		})
	}
}

/// Connector that hands out one shared [`ScriptedChannel`] and counts connects.
pub struct CountingConnector {
	pub channel: Arc<ScriptedChannel>,
	connects: AtomicUsize,
}
impl CountingConnector {
	pub fn new(channel: ScriptedChannel) -> Arc<Self> {
		Arc::new(Self { channel: Arc::new(channel), connects: AtomicUsize::new(0) })
	}

	pub fn connects(&self) -> usize {
		self.connects.load(Ordering::SeqCst)
	}

	pub fn exchanges(&self) -> usize {
		self.channel.exchanges()
	}
}
impl BootstrapConnector for CountingConnector {
	fn connect(&self, _config: &Configuration) -> Result<Arc<dyn BootstrapChannel>> {
		self.connects.fetch_add(1, Ordering::SeqCst);

		Ok(self.channel.clone())
	}
}

pub fn exchange_config() -> Configuration {
	Configuration::new(BASE_ADDRESS)
		.with_client_credentials(ClientCredentials::new("cid", "csec", "eid", "esec"))
}

pub fn static_config() -> Configuration {
	Configuration::new(BASE_ADDRESS).with_static_token("tok-abc")
}
