//! Unauthenticated bootstrap channel that trades client credentials for an access token.
//!
//! [`BootstrapConnector`] builds a [`BootstrapChannel`] against a configuration's base
//! address; the channel performs exactly one exchange per call and reports its own errors.
//! With the `reqwest` feature, [`ReqwestBootstrapConnector`] runs an OAuth 2.0
//! `client_credentials` grant: `client_id`/`client_secret` authenticate the client and the
//! exchange pair travels as extra form parameters.

// self
use crate::{_prelude::*, auth::TokenSecret, config::Configuration};
#[cfg(feature = "reqwest")]
use crate::{
	error::{ConfigError, TransientError, TransportError},
	http::{ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot},
};
#[cfg(feature = "reqwest")]
use oauth2::{
	ClientId, ClientSecret, HttpClientError, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError},
};

/// Boxed future returned by [`BootstrapChannel::exchange`].
pub type BootstrapFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Credentials submitted in a single exchange.
#[derive(Clone)]
pub struct ExchangeRequest {
	/// Client identifier used for client authentication.
	pub client_id: String,
	/// Client secret used for client authentication.
	pub client_secret: TokenSecret,
	/// Secondary identifier forwarded with the exchange.
	pub exchange_id: String,
	/// Secondary secret forwarded with the exchange.
	pub exchange_secret: TokenSecret,
}
impl Debug for ExchangeRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ExchangeRequest")
			.field("client_id", &self.client_id)
			.field("exchange_id", &self.exchange_id)
			.finish_non_exhaustive()
	}
}

/// Unauthenticated channel able to perform one credential exchange per call.
pub trait BootstrapChannel
where
	Self: Send + Sync,
{
	/// Exchanges client credentials for an access token.
	fn exchange<'a>(&'a self, request: &'a ExchangeRequest) -> BootstrapFuture<'a, TokenSecret>;
}

/// Builds bootstrap channels for a configuration.
///
/// Connecting must not perform network I/O; the first request happens on
/// [`BootstrapChannel::exchange`].
pub trait BootstrapConnector
where
	Self: Send + Sync,
{
	/// Constructs a channel bound to the configuration's base address.
	fn connect(&self, config: &Configuration) -> Result<Arc<dyn BootstrapChannel>>;
}

/// Default connector that issues exchanges with reqwest through the `oauth2` crate.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestBootstrapConnector {
	http_client: ReqwestHttpClient,
}
#[cfg(feature = "reqwest")]
impl ReqwestBootstrapConnector {
	/// Reuses a caller-provided HTTP client for every channel.
	pub fn with_http_client(http_client: ReqwestHttpClient) -> Self {
		Self { http_client }
	}
}
#[cfg(feature = "reqwest")]
impl BootstrapConnector for ReqwestBootstrapConnector {
	fn connect(&self, config: &Configuration) -> Result<Arc<dyn BootstrapChannel>> {
		let endpoint = config.token_endpoint()?;
		let token_url = TokenUrl::from_url(endpoint);

		Ok(Arc::new(ReqwestBootstrapChannel { http_client: self.http_client.clone(), token_url }))
	}
}

/// Bootstrap channel bound to a single token endpoint.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestBootstrapChannel {
	http_client: ReqwestHttpClient,
	token_url: TokenUrl,
}
#[cfg(feature = "reqwest")]
impl BootstrapChannel for ReqwestBootstrapChannel {
	fn exchange<'a>(&'a self, request: &'a ExchangeRequest) -> BootstrapFuture<'a, TokenSecret> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.instrumented(meta.clone());
			let oauth_client = BasicClient::new(ClientId::new(request.client_id.clone()))
				.set_client_secret(ClientSecret::new(request.client_secret.expose().to_owned()))
				.set_token_uri(self.token_url.clone());
			let response = oauth_client
				.exchange_client_credentials()
				.add_extra_param("exchange_id", request.exchange_id.clone())
				.add_extra_param("exchange_secret", request.exchange_secret.expose().to_owned())
				.request_async(&instrumented)
				.await
				.map_err(|err| map_request_error(meta.take(), err))?;

			Ok(TokenSecret::new(response.access_token().secret().to_owned()))
		})
	}
}

#[cfg(feature = "reqwest")]
fn map_request_error(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<ReqwestError>>,
) -> Error {
	let status = meta.and_then(|value| value.status);

	match err {
		RequestTokenError::ServerResponse(response) => map_server_response_error(response, status),
		RequestTokenError::Request(error) => map_transport_error(error, status),
		RequestTokenError::Parse(source, _body) =>
			TransientError::TokenResponseParse { source, status }.into(),
		RequestTokenError::Other(message) =>
			TransientError::TokenEndpoint { message, status }.into(),
	}
}

#[cfg(feature = "reqwest")]
fn map_server_response_error(response: BasicErrorResponse, status: Option<u16>) -> Error {
	let code = response.error().as_ref().to_string();
	let message = match response.error_description() {
		Some(description) => format!("{code}: {description}"),
		None => code.clone(),
	};

	if code.eq_ignore_ascii_case("invalid_client") || code.eq_ignore_ascii_case("unauthorized_client")
	{
		Error::InvalidClient { reason: message }
	} else {
		TransientError::TokenEndpoint { message, status }.into()
	}
}

#[cfg(feature = "reqwest")]
fn map_transport_error(err: HttpClientError<ReqwestError>, status: Option<u16>) -> Error {
	match err {
		HttpClientError::Reqwest(inner) => map_reqwest_error(*inner, status),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransientError::TokenEndpoint {
			message: format!("HTTP client error: {message}"),
			status,
		}
		.into(),
		_ => TransientError::TokenEndpoint { message: "HTTP client error".into(), status }.into(),
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(err: ReqwestError, status: Option<u16>) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::TokenEndpoint {
			message: "request timed out".into(),
			status: status.or_else(|| err.status().map(|code| code.as_u16())),
		}
		.into();
	}

	TransportError::from(err).into()
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;

	#[test]
	fn connector_resolves_token_endpoint_without_io() {
		let config = Configuration::new("https://api.example.test/iam");
		let connector = ReqwestBootstrapConnector::default();

		connector.connect(&config).expect("Connecting should not require network access.");
		assert_eq!(
			config.token_endpoint().expect("Token endpoint should resolve.").as_str(),
			"https://api.example.test/iam/oauth2/token"
		);
	}

	#[test]
	fn connector_rejects_missing_base_address() {
		let err = ReqwestBootstrapConnector::default()
			.connect(&Configuration::new(" "))
			.err()
			.expect("An empty base address must be rejected.");

		assert!(matches!(err, Error::Config(ConfigError::MissingBaseAddress)));
	}

	#[test]
	fn exchange_request_debug_redacts_secrets() {
		let request = ExchangeRequest {
			client_id: "cid".into(),
			client_secret: "csec".into(),
			exchange_id: "eid".into(),
			exchange_secret: "esec".into(),
		};
		let rendered = format!("{request:?}");

		assert!(rendered.contains("cid"));
		assert!(!rendered.contains("csec"));
		assert!(!rendered.contains("esec"));
	}
}
