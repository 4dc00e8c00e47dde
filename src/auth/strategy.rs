//! Credential strategies and the selection rule that picks one for a configuration.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	bootstrap::{BootstrapChannel, BootstrapConnector, ExchangeRequest},
	config::{ClientCredentials, Configuration, CredentialKind},
	error::ConfigError,
};

/// Boxed future returned by [`CredentialStrategy::access_token`].
pub type CredentialFuture<'a> = Pin<Box<dyn Future<Output = Result<TokenSecret>> + 'a + Send>>;

/// Capability that yields the current access token on demand.
///
/// Strategies are stateless from the cache's point of view; an implementation may keep
/// its own token cache, but the connection cache never relies on it.
pub trait CredentialStrategy
where
	Self: Send + Sync,
{
	/// Produces the current access token.
	fn access_token(&self) -> CredentialFuture<'_>;

	/// Which kind of credential backs this strategy.
	fn kind(&self) -> CredentialKind;
}

/// Strategy that always returns the same pre-issued token.
#[derive(Clone, Debug)]
pub struct StaticTokenStrategy(TokenSecret);
impl StaticTokenStrategy {
	/// Wraps a pre-issued token.
	pub fn new(token: impl Into<TokenSecret>) -> Self {
		Self(token.into())
	}
}
impl CredentialStrategy for StaticTokenStrategy {
	fn access_token(&self) -> CredentialFuture<'_> {
		let token = self.0.clone();

		Box::pin(async move { Ok(token) })
	}

	fn kind(&self) -> CredentialKind {
		CredentialKind::Static
	}
}

/// Strategy that exchanges client credentials over a bootstrap channel on every call.
#[derive(Clone)]
pub struct ClientCredentialsStrategy {
	channel: Arc<dyn BootstrapChannel>,
	request: ExchangeRequest,
}
impl ClientCredentialsStrategy {
	/// Creates a strategy from a channel and a complete credential set.
	pub fn new(
		channel: Arc<dyn BootstrapChannel>,
		credentials: &ClientCredentials,
	) -> Result<Self, ConfigError> {
		if let Some(field) = credentials.missing_field() {
			return Err(ConfigError::IncompleteClientCredentials { field });
		}

		let request = ExchangeRequest {
			client_id: credentials.client_id.clone(),
			client_secret: credentials.client_secret.clone(),
			exchange_id: credentials.exchange_id.clone(),
			exchange_secret: credentials.exchange_secret.clone(),
		};

		Ok(Self { channel, request })
	}
}
impl CredentialStrategy for ClientCredentialsStrategy {
	fn access_token(&self) -> CredentialFuture<'_> {
		self.channel.exchange(&self.request)
	}

	fn kind(&self) -> CredentialKind {
		CredentialKind::ClientCredentials
	}
}
impl Debug for ClientCredentialsStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientCredentialsStrategy").field("request", &self.request).finish()
	}
}

/// Picks the credential strategy for a configuration.
///
/// A non-empty static token wins and the connector is never touched. Otherwise the
/// connector builds a bootstrap channel for the client-credential exchange. No token is
/// requested here in either case.
pub fn select_strategy(
	config: &Configuration,
	connector: &dyn BootstrapConnector,
) -> Result<Arc<dyn CredentialStrategy>> {
	match config.validate()? {
		CredentialKind::Static => {
			let token = config.static_token.clone().ok_or(ConfigError::MissingCredentials)?;

			Ok(Arc::new(StaticTokenStrategy::new(token)))
		},
		CredentialKind::ClientCredentials => {
			let credentials =
				config.client_credentials.as_ref().ok_or(ConfigError::MissingCredentials)?;
			let channel = connector.connect(config)?;

			Ok(Arc::new(ClientCredentialsStrategy::new(channel, credentials)?))
		},
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::bootstrap::BootstrapFuture;

	#[derive(Default)]
	struct RecordingConnector {
		connects: AtomicUsize,
		exchanges: Arc<AtomicUsize>,
	}
	impl BootstrapConnector for RecordingConnector {
		fn connect(&self, _config: &Configuration) -> Result<Arc<dyn BootstrapChannel>> {
			self.connects.fetch_add(1, Ordering::SeqCst);

			Ok(Arc::new(RecordingChannel(self.exchanges.clone())))
		}
	}

	struct RecordingChannel(Arc<AtomicUsize>);
	impl BootstrapChannel for RecordingChannel {
		fn exchange<'a>(
			&'a self,
			request: &'a ExchangeRequest,
		) -> BootstrapFuture<'a, TokenSecret> {
			self.0.fetch_add(1, Ordering::SeqCst);

			let token = format!("token-for-{}", request.client_id);

			Box::pin(async move { Ok(TokenSecret::new(token)) })
		}
	}

	fn credentials() -> ClientCredentials {
		ClientCredentials::new("cid", "csec", "eid", "esec")
	}

	#[tokio::test]
	async fn static_token_never_contacts_the_connector() {
		let connector = RecordingConnector::default();
		let config = Configuration::new("https://api.example.test")
			.with_static_token("tok-abc")
			.with_client_credentials(credentials());
		let strategy =
			select_strategy(&config, &connector).expect("Static selection should succeed.");
		let token = strategy.access_token().await.expect("Static token should be returned.");

		assert_eq!(strategy.kind(), CredentialKind::Static);
		assert_eq!(token.expose(), "tok-abc");
		assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
		assert_eq!(connector.exchanges.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn exchange_strategy_defers_network_calls_until_asked() {
		let connector = RecordingConnector::default();
		let config = Configuration::new("https://api.example.test")
			.with_client_credentials(credentials());
		let strategy =
			select_strategy(&config, &connector).expect("Credential selection should succeed.");

		assert_eq!(strategy.kind(), CredentialKind::ClientCredentials);
		assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
		assert_eq!(connector.exchanges.load(Ordering::SeqCst), 0);

		let token = strategy.access_token().await.expect("Exchange should yield a token.");

		assert_eq!(token.expose(), "token-for-cid");
		assert_eq!(connector.exchanges.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn invalid_configuration_fails_before_connecting() {
		let connector = RecordingConnector::default();
		let config = Configuration::new("https://api.example.test")
			.with_client_credentials(ClientCredentials::new("cid", "", "eid", "esec"));
		let err = select_strategy(&config, &connector)
			.err()
			.expect("Incomplete credentials must be rejected.");

		assert!(matches!(
			err,
			Error::Config(ConfigError::IncompleteClientCredentials { field: "client_secret" })
		));
		assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
	}
}
