//! Connection cache: one shared session handle, refreshed by at most one caller at a time.
//!
//! [`ConnectionCache::acquire`] first checks the entry under a shared lock and returns a
//! fresh handle without any I/O. When the entry is absent or stale it takes the exclusive
//! lock and re-checks, because another caller may have refreshed while this one waited.
//! Only a caller that still finds the entry stale runs credential selection, the prober,
//! and the session factory, all while holding the exclusive lock. A successful refresh
//! replaces the entry wholesale; a failed one leaves it untouched, so the next caller
//! (including any waiter already queued on the lock) tries again.

mod metrics;

pub use metrics::CacheMetrics;

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
#[cfg(feature = "reqwest")] use crate::bootstrap::ReqwestBootstrapConnector;
#[cfg(not(feature = "reqwest"))] use crate::bootstrap::BootstrapChannel;
use crate::{
	_prelude::*,
	auth::{self, CredentialStrategy},
	bootstrap::BootstrapConnector,
	clock::{Clock, SystemClock},
	config::Configuration,
	error::ConfigError,
	obs::{self, AcquireOutcome, AcquirePath, CacheSpan},
	probe::{Prober, RetryPolicy},
	session::{SessionFactory, SessionHandle},
};

/// Tuning knobs for a [`ConnectionCache`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachePolicy {
	/// How long a handle stays fresh after it was published.
	pub ttl: Duration,
	/// Retry budget used while probing credentials.
	pub retry: RetryPolicy,
	/// Optional deadline applied to every [`ConnectionCache::acquire`] call.
	pub acquire_timeout: Option<StdDuration>,
}
impl CachePolicy {
	/// Default freshness window.
	pub const DEFAULT_TTL: Duration = Duration::minutes(5);

	/// Overrides the freshness window (negative values collapse to zero).
	pub fn with_ttl(mut self, ttl: Duration) -> Self {
		self.ttl = if ttl.is_negative() { Duration::ZERO } else { ttl };

		self
	}

	/// Overrides the prober's retry budget.
	pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Bounds every acquire call by the provided deadline.
	pub fn with_acquire_timeout(mut self, timeout: StdDuration) -> Self {
		self.acquire_timeout = Some(timeout);

		self
	}
}
impl Default for CachePolicy {
	fn default() -> Self {
		Self { ttl: Self::DEFAULT_TTL, retry: RetryPolicy::default(), acquire_timeout: None }
	}
}

/// Observable state of the cache entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheState {
	/// No handle has been published yet (or it was invalidated).
	Empty,
	/// A handle exists and is inside the freshness window.
	Fresh,
	/// A handle exists but the next acquire will refresh it.
	Stale,
}

/// Published handle plus the timestamp that governs its freshness.
#[derive(Clone, Debug)]
pub struct CacheEntry {
	/// Shared session handle.
	pub handle: SessionHandle,
	/// Instant the handle was published.
	pub created_at: OffsetDateTime,
}
impl CacheEntry {
	/// Fresh iff strictly less than `ttl` has elapsed since publication.
	///
	/// A `now` earlier than `created_at` (the clock stepped backward) counts as stale.
	pub fn is_fresh_at(&self, now: OffsetDateTime, ttl: Duration) -> bool {
		let elapsed = now - self.created_at;

		!elapsed.is_negative() && elapsed < ttl
	}
}

struct CacheSlot {
	config: Arc<Configuration>,
	fingerprint: String,
	entry: Option<CacheEntry>,
}
impl CacheSlot {
	fn new(config: Configuration) -> Self {
		let fingerprint = config.fingerprint();

		Self { config: Arc::new(config), fingerprint, entry: None }
	}

	fn fresh_handle(&self, now: OffsetDateTime, ttl: Duration) -> Option<SessionHandle> {
		self.entry
			.as_ref()
			.filter(|entry| entry.is_fresh_at(now, ttl))
			.map(|entry| entry.handle.clone())
	}

	fn ensure_bound(&self, requested: Option<&str>) -> Result<(), ConfigError> {
		match requested {
			Some(requested) if requested != self.fingerprint =>
				Err(ConfigError::ConfigurationMismatch {
					bound: self.fingerprint.clone(),
					requested: requested.to_owned(),
				}),
			_ => Ok(()),
		}
	}
}

/// Tracks how far an acquire got, so a timeout can be labeled by the path it was pending on.
#[derive(Debug, Default)]
struct AcquireProgress(AtomicBool);
impl AcquireProgress {
	fn enter_slow_path(&self) {
		self.0.store(true, Ordering::Relaxed);
	}

	fn path(&self) -> AcquirePath {
		if self.0.load(Ordering::Relaxed) { AcquirePath::SlowPath } else { AcquirePath::FastPath }
	}
}

struct CacheInner {
	slot: AsyncRwLock<CacheSlot>,
	connector: Arc<dyn BootstrapConnector>,
	policy: CachePolicy,
	prober: Prober,
	factory: SessionFactory,
	clock: Arc<dyn Clock>,
	metrics: CacheMetrics,
}

/// Explicit, cheaply cloneable cache of one authenticated session handle.
///
/// Clones share the same entry. Backoff sleeps and deadlines use `tokio::time`, so the
/// cache must be driven from within a Tokio runtime.
#[derive(Clone)]
pub struct ConnectionCache(Arc<CacheInner>);
impl ConnectionCache {
	/// Creates a cache with default policy that exchanges credentials over reqwest.
	#[cfg(feature = "reqwest")]
	pub fn new(config: Configuration) -> Self {
		Self::builder(config).build()
	}

	/// Starts building a cache bound to `config`.
	pub fn builder(config: Configuration) -> ConnectionCacheBuilder {
		ConnectionCacheBuilder::new(config)
	}

	/// Returns a session handle, refreshing it first when absent or stale.
	///
	/// Applies [`CachePolicy::acquire_timeout`] when configured.
	pub async fn acquire(&self) -> Result<SessionHandle> {
		self.acquire_bounded(None, self.0.policy.acquire_timeout, &AcquireProgress::default())
			.await
	}

	/// Same as [`acquire`](Self::acquire) but rejects a configuration the cache is not bound to.
	///
	/// Use [`reconfigure`](Self::reconfigure) to switch configurations explicitly.
	pub async fn acquire_with(&self, config: &Configuration) -> Result<SessionHandle> {
		let requested = config.fingerprint();

		self.acquire_bounded(
			Some(&requested),
			self.0.policy.acquire_timeout,
			&AcquireProgress::default(),
		)
		.await
	}

	/// Acquires with an explicit deadline covering lock waits and the handshake.
	///
	/// When the deadline elapses the caller gets [`Error::Timeout`]. If that caller was the
	/// one refreshing, the refresh is abandoned and the entry stays as it was.
	pub async fn acquire_within(&self, timeout: StdDuration) -> Result<SessionHandle> {
		self.acquire_bounded(None, Some(timeout), &AcquireProgress::default()).await
	}

	/// Switches to a new configuration, dropping the cached handle if it changed.
	///
	/// The configuration is validated first; an invalid one leaves the cache untouched.
	pub async fn reconfigure(&self, config: Configuration) -> Result<()> {
		config.validate()?;

		let next = CacheSlot::new(config);
		let mut slot = self.0.slot.write().await;

		if slot.fingerprint != next.fingerprint {
			*slot = next;
		}

		Ok(())
	}

	/// Drops the cached handle so the next acquire re-authenticates.
	pub async fn invalidate(&self) {
		self.0.slot.write().await.entry = None;
	}

	/// Reports whether the entry is empty, fresh, or stale right now.
	pub async fn state(&self) -> CacheState {
		let now = self.0.clock.now();
		let slot = self.0.slot.read().await;

		match &slot.entry {
			None => CacheState::Empty,
			Some(entry) if entry.is_fresh_at(now, self.0.policy.ttl) => CacheState::Fresh,
			Some(_) => CacheState::Stale,
		}
	}

	/// Configuration the cache is currently bound to.
	pub async fn configuration(&self) -> Arc<Configuration> {
		self.0.slot.read().await.config.clone()
	}

	/// Policy in effect.
	pub fn policy(&self) -> &CachePolicy {
		&self.0.policy
	}

	/// Outcome counters.
	pub fn metrics(&self) -> &CacheMetrics {
		&self.0.metrics
	}

	async fn acquire_bounded(
		&self,
		requested: Option<&str>,
		timeout: Option<StdDuration>,
		progress: &AcquireProgress,
	) -> Result<SessionHandle> {
		let acquire = self.acquire_checked(requested, progress);
		let Some(timeout) = timeout else {
			return acquire.await;
		};

		match tokio::time::timeout(timeout, acquire).await {
			Ok(result) => result,
			Err(_) => {
				self.0.metrics.record_timeout();
				obs::record_acquire_outcome(progress.path(), AcquireOutcome::Timeout);

				Err(Error::Timeout { after: timeout })
			},
		}
	}

	async fn acquire_checked(
		&self,
		requested: Option<&str>,
		progress: &AcquireProgress,
	) -> Result<SessionHandle> {
		let fingerprint = {
			let slot = self.0.slot.read().await;

			slot.ensure_bound(requested)?;

			if let Some(handle) = slot.fresh_handle(self.0.clock.now(), self.0.policy.ttl) {
				self.0.metrics.record_hit();
				obs::record_acquire_outcome(AcquirePath::FastPath, AcquireOutcome::Hit);

				return Ok(handle);
			}

			slot.fingerprint.clone()
		};

		progress.enter_slow_path();

		let span = CacheSpan::new(AcquirePath::SlowPath, &fingerprint);

		span.instrument(self.refresh(requested)).await
	}

	async fn refresh(&self, requested: Option<&str>) -> Result<SessionHandle> {
		let mut slot = self.0.slot.write().await;

		slot.ensure_bound(requested)?;

		if let Some(handle) = slot.fresh_handle(self.0.clock.now(), self.0.policy.ttl) {
			self.0.metrics.record_hit();
			obs::record_acquire_outcome(AcquirePath::SlowPath, AcquireOutcome::Hit);

			return Ok(handle);
		}

		let config = slot.config.clone();

		match self.populate(&config).await {
			Ok(handle) => {
				slot.entry =
					Some(CacheEntry { handle: handle.clone(), created_at: handle.created_at() });

				self.0.metrics.record_refresh();
				obs::record_acquire_outcome(AcquirePath::SlowPath, AcquireOutcome::Refreshed);

				Ok(handle)
			},
			Err(err) => {
				self.0.metrics.record_failure();
				obs::record_acquire_outcome(AcquirePath::SlowPath, AcquireOutcome::Failure);

				Err(err)
			},
		}
	}

	async fn populate(&self, config: &Configuration) -> Result<SessionHandle> {
		let strategy: Arc<dyn CredentialStrategy> =
			auth::select_strategy(config, self.0.connector.as_ref())?;
		let report = self.0.prober.probe(strategy.as_ref()).await?;

		self.0.factory.build(config, strategy, report, self.0.clock.now())
	}
}
impl Debug for ConnectionCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ConnectionCache")
			.field("policy", &self.0.policy)
			.field("metrics", &self.0.metrics)
			.finish_non_exhaustive()
	}
}

/// Builder for [`ConnectionCache`] values.
pub struct ConnectionCacheBuilder {
	config: Configuration,
	connector: Option<Arc<dyn BootstrapConnector>>,
	policy: CachePolicy,
	clock: Arc<dyn Clock>,
}
impl ConnectionCacheBuilder {
	/// Creates a builder with the default policy and the system clock.
	pub fn new(config: Configuration) -> Self {
		Self {
			config,
			connector: None,
			policy: CachePolicy::default(),
			clock: Arc::new(SystemClock),
		}
	}

	/// Supplies the connector used to build bootstrap channels.
	pub fn connector(mut self, connector: Arc<dyn BootstrapConnector>) -> Self {
		self.connector = Some(connector);

		self
	}

	/// Replaces the whole policy.
	pub fn policy(mut self, policy: CachePolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Overrides the freshness window.
	pub fn ttl(mut self, ttl: Duration) -> Self {
		self.policy = self.policy.with_ttl(ttl);

		self
	}

	/// Overrides the prober's retry budget.
	pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
		self.policy = self.policy.with_retry(retry);

		self
	}

	/// Bounds every acquire call by the provided deadline.
	pub fn acquire_timeout(mut self, timeout: StdDuration) -> Self {
		self.policy = self.policy.with_acquire_timeout(timeout);

		self
	}

	/// Replaces the time source used for freshness decisions.
	pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Finalizes the cache. The configuration is validated lazily on the first acquire.
	pub fn build(self) -> ConnectionCache {
		let connector = self.connector.unwrap_or_else(default_connector);
		let prober = Prober::new(self.policy.retry);

		ConnectionCache(Arc::new(CacheInner {
			slot: AsyncRwLock::new(CacheSlot::new(self.config)),
			connector,
			policy: self.policy,
			prober,
			factory: SessionFactory::default(),
			clock: self.clock,
			metrics: CacheMetrics::default(),
		}))
	}
}
impl Debug for ConnectionCacheBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ConnectionCacheBuilder")
			.field("config", &self.config)
			.field("connector_set", &self.connector.is_some())
			.field("policy", &self.policy)
			.finish_non_exhaustive()
	}
}

#[cfg(feature = "reqwest")]
fn default_connector() -> Arc<dyn BootstrapConnector> {
	Arc::new(ReqwestBootstrapConnector::default())
}

#[cfg(not(feature = "reqwest"))]
fn default_connector() -> Arc<dyn BootstrapConnector> {
	Arc::new(MissingConnector)
}

#[cfg(not(feature = "reqwest"))]
struct MissingConnector;
#[cfg(not(feature = "reqwest"))]
impl BootstrapConnector for MissingConnector {
	fn connect(&self, _config: &Configuration) -> Result<Arc<dyn BootstrapChannel>> {
		Err(ConfigError::MissingConnector.into())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		auth::TokenSecret,
		bootstrap::{BootstrapChannel, BootstrapFuture, ExchangeRequest},
		clock::ManualClock,
		config::ClientCredentials,
	};

	fn static_cache(clock: Arc<ManualClock>) -> ConnectionCache {
		ConnectionCache::builder(
			Configuration::new("https://api.example.test").with_static_token("tok-abc"),
		)
		.clock(clock)
		.build()
	}

	#[test]
	fn freshness_is_strictly_less_than_ttl() {
		let created_at = OffsetDateTime::UNIX_EPOCH;
		let handle = SessionFactory::default()
			.build(
				&Configuration::new("https://api.example.test"),
				Arc::new(auth::StaticTokenStrategy::new("tok")),
				crate::probe::ProbeReport { token: "tok".into(), attempts: 1 },
				created_at,
			)
			.expect("Handle should build.");
		let entry = CacheEntry { handle, created_at };
		let ttl = CachePolicy::DEFAULT_TTL;

		assert!(entry.is_fresh_at(created_at, ttl));
		assert!(entry.is_fresh_at(created_at + ttl - Duration::nanoseconds(1), ttl));
		assert!(!entry.is_fresh_at(created_at + ttl, ttl));
		assert!(!entry.is_fresh_at(created_at - Duration::seconds(1), ttl));
	}

	#[test]
	fn policy_defaults_and_clamping() {
		let policy = CachePolicy::default();

		assert_eq!(policy.ttl, Duration::minutes(5));
		assert_eq!(policy.retry, RetryPolicy::default());
		assert!(policy.acquire_timeout.is_none());
		assert_eq!(CachePolicy::default().with_ttl(Duration::seconds(-5)).ttl, Duration::ZERO);
	}

	#[tokio::test]
	async fn state_walks_empty_fresh_stale() {
		let clock = Arc::new(ManualClock::new(OffsetDateTime::UNIX_EPOCH));
		let cache = static_cache(clock.clone());

		assert_eq!(cache.state().await, CacheState::Empty);

		let handle = cache.acquire().await.expect("Static acquire should succeed.");

		assert_eq!(cache.state().await, CacheState::Fresh);
		assert_eq!(handle.created_at(), OffsetDateTime::UNIX_EPOCH);

		clock.advance(Duration::minutes(5));

		assert_eq!(cache.state().await, CacheState::Stale);

		cache.invalidate().await;

		assert_eq!(cache.state().await, CacheState::Empty);
	}

	#[tokio::test]
	async fn reconfigure_rejects_invalid_and_drops_entry_on_change() {
		let clock = Arc::new(ManualClock::new(OffsetDateTime::UNIX_EPOCH));
		let cache = static_cache(clock);
		let first = cache.acquire().await.expect("Static acquire should succeed.");
		let err = cache
			.reconfigure(Configuration::new("https://api.example.test"))
			.await
			.expect_err("Configuration without credentials must be rejected.");

		assert!(err.is_config());
		assert_eq!(cache.state().await, CacheState::Fresh);

		cache
			.reconfigure(
				Configuration::new("https://api.example.test").with_static_token("tok-abc"),
			)
			.await
			.expect("Reapplying the bound configuration is a no-op.");

		assert_eq!(cache.acquire().await.expect("Entry should be kept."), first);

		let next = Configuration::new("https://api.example.test").with_static_token("tok-next");

		cache.reconfigure(next.clone()).await.expect("A valid configuration should be accepted.");

		assert_eq!(cache.state().await, CacheState::Empty);

		let second = cache.acquire_with(&next).await.expect("New configuration should be bound.");

		assert_ne!(first, second);
		assert_eq!(second.initial_token().expose(), "tok-next");
		assert_eq!(cache.configuration().await.as_ref(), &next);
	}

	struct StalledChannel;
	impl BootstrapChannel for StalledChannel {
		fn exchange<'a>(
			&'a self,
			_request: &'a ExchangeRequest,
		) -> BootstrapFuture<'a, TokenSecret> {
			Box::pin(async {
				tokio::time::sleep(StdDuration::from_secs(3600)).await;

				Ok(TokenSecret::new("late"))
			})
		}
	}

	struct StalledConnector;
	impl BootstrapConnector for StalledConnector {
		fn connect(&self, _config: &Configuration) -> Result<Arc<dyn BootstrapChannel>> {
			Ok(Arc::new(StalledChannel))
		}
	}

	#[tokio::test(start_paused = true)]
	async fn timeout_on_shared_lock_is_labeled_fast_path() {
		let cache = static_cache(Arc::new(ManualClock::default()));
		let progress = AcquireProgress::default();
		let _writer = cache.0.slot.write().await;
		let err = cache
			.acquire_bounded(None, Some(StdDuration::from_secs(1)), &progress)
			.await
			.expect_err("The shared lock is never granted.");

		assert!(matches!(err, Error::Timeout { .. }));
		assert_eq!(progress.path(), AcquirePath::FastPath);
		assert_eq!(cache.metrics().timeouts(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn timeout_during_refresh_is_labeled_slow_path() {
		let cache = ConnectionCache::builder(
			Configuration::new("https://api.example.test")
				.with_client_credentials(ClientCredentials::new("cid", "csec", "eid", "esec")),
		)
		.connector(Arc::new(StalledConnector))
		.build();
		let progress = AcquireProgress::default();
		let err = cache
			.acquire_bounded(None, Some(StdDuration::from_secs(1)), &progress)
			.await
			.expect_err("The exchange never completes in time.");

		assert!(matches!(err, Error::Timeout { .. }));
		assert_eq!(progress.path(), AcquirePath::SlowPath);
		assert_eq!(cache.state().await, CacheState::Empty);
	}

	#[tokio::test]
	async fn acquire_with_rejects_unbound_configuration() {
		let cache = static_cache(Arc::new(ManualClock::default()));
		let other = Configuration::new("https://other.example.test").with_static_token("tok-abc");
		let err = cache.acquire_with(&other).await.expect_err("Mismatched configuration.");

		assert!(matches!(err, Error::Config(ConfigError::ConfigurationMismatch { .. })));
		assert_eq!(cache.metrics().refreshes(), 0);
	}
}
