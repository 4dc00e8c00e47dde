// self
use crate::{_prelude::*, obs::AcquirePath};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedAcquire<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedAcquire<F> = F;

/// Span wrapper used around the cache's exclusive-lock path.
#[derive(Clone, Debug)]
pub struct CacheSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl CacheSpan {
	/// Creates a span tagged with the acquire path and the configuration fingerprint.
	pub fn new(path: AcquirePath, fingerprint: &str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"iam_session_cache.acquire",
				path = path.as_str(),
				config = fingerprint
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (path, fingerprint);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedAcquire<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}
