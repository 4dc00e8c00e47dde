//! Connection configuration: base address plus either a static token or a client-credential set.
//!
//! [`Configuration`] is a plain value that hosts can build fluently or deserialize from their
//! own configuration document. Nothing here performs I/O; [`Configuration::validate`] decides
//! which credential strategy applies and rejects incomplete inputs up front.

// std
use std::sync::LazyLock;
// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

/// Default path (relative to the base address) of the bootstrap token endpoint.
pub const DEFAULT_TOKEN_PATH: &str = "oauth2/token";

static FINGERPRINT_KEY: LazyLock<[u8; 32]> = LazyLock::new(rand::random);

/// Which credential strategy a configuration selects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
	/// Pre-issued token returned as-is.
	Static,
	/// Client credentials traded for a token over the bootstrap channel.
	ClientCredentials,
}
impl CredentialKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CredentialKind::Static => "static",
			CredentialKind::ClientCredentials => "client_credentials",
		}
	}
}
impl Display for CredentialKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Four-field credential set exchanged for an access token.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientCredentials {
	/// Client identifier used for client authentication.
	pub client_id: String,
	/// Client secret used for client authentication.
	pub client_secret: TokenSecret,
	/// Secondary identifier forwarded with the exchange.
	pub exchange_id: String,
	/// Secondary secret forwarded with the exchange.
	pub exchange_secret: TokenSecret,
}
impl ClientCredentials {
	/// Creates a credential set from its four parts.
	pub fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<TokenSecret>,
		exchange_id: impl Into<String>,
		exchange_secret: impl Into<TokenSecret>,
	) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: client_secret.into(),
			exchange_id: exchange_id.into(),
			exchange_secret: exchange_secret.into(),
		}
	}

	/// Name of the first empty field, if any.
	pub fn missing_field(&self) -> Option<&'static str> {
		if self.client_id.trim().is_empty() {
			Some("client_id")
		} else if self.client_secret.is_empty() {
			Some("client_secret")
		} else if self.exchange_id.trim().is_empty() {
			Some("exchange_id")
		} else if self.exchange_secret.is_empty() {
			Some("exchange_secret")
		} else {
			None
		}
	}
}
impl Debug for ClientCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientCredentials")
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.field("exchange_id", &self.exchange_id)
			.field("exchange_secret", &"<redacted>")
			.finish()
	}
}

/// Immutable input describing how to reach and authenticate against the remote service.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Configuration {
	/// Base address of the remote service.
	pub base_address: String,
	/// Optional pre-issued token; takes precedence over client credentials.
	#[serde(default)]
	pub static_token: Option<TokenSecret>,
	/// Optional client-credential set used when no static token is present.
	#[serde(default)]
	pub client_credentials: Option<ClientCredentials>,
	/// Token endpoint path joined onto the base address.
	#[serde(default = "default_token_path")]
	pub token_path: String,
}
impl Configuration {
	/// Creates a configuration with no credentials attached yet.
	pub fn new(base_address: impl Into<String>) -> Self {
		Self {
			base_address: base_address.into(),
			static_token: None,
			client_credentials: None,
			token_path: DEFAULT_TOKEN_PATH.into(),
		}
	}

	/// Attaches a pre-issued token.
	pub fn with_static_token(mut self, token: impl Into<TokenSecret>) -> Self {
		self.static_token = Some(token.into());

		self
	}

	/// Attaches a client-credential set.
	pub fn with_client_credentials(mut self, credentials: ClientCredentials) -> Self {
		self.client_credentials = Some(credentials);

		self
	}

	/// Overrides the token endpoint path (defaults to [`DEFAULT_TOKEN_PATH`]).
	pub fn with_token_path(mut self, path: impl Into<String>) -> Self {
		self.token_path = path.into();

		self
	}

	/// Checks the configuration invariant and reports which strategy applies.
	///
	/// A non-empty static token wins even when the client-credential set is partial.
	pub fn validate(&self) -> Result<CredentialKind, ConfigError> {
		self.base_url()?;

		if self.static_token.as_ref().is_some_and(|token| !token.is_empty()) {
			return Ok(CredentialKind::Static);
		}

		let credentials = self.client_credentials.as_ref().ok_or(ConfigError::MissingCredentials)?;

		match credentials.missing_field() {
			Some(field) => Err(ConfigError::IncompleteClientCredentials { field }),
			None => Ok(CredentialKind::ClientCredentials),
		}
	}

	/// Parses the base address, normalizing it to end with `/` so relative joins append.
	pub fn base_url(&self) -> Result<Url, ConfigError> {
		let raw = self.base_address.trim();

		if raw.is_empty() {
			return Err(ConfigError::MissingBaseAddress);
		}

		let mut url = Url::parse(raw)
			.map_err(|source| ConfigError::InvalidBaseAddress { value: raw.to_owned(), source })?;

		if !url.path().ends_with('/') {
			let path = format!("{}/", url.path());

			url.set_path(&path);
		}

		Ok(url)
	}

	/// Resolves a path relative to the base address.
	pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
		join_endpoint(&self.base_url()?, path)
	}

	/// Resolves the bootstrap token endpoint.
	pub fn token_endpoint(&self) -> Result<Url, ConfigError> {
		self.endpoint(&self.token_path)
	}

	/// Fingerprint of the whole configuration, secrets included.
	///
	/// The value is a base64 (no padding) SHA-256 digest keyed with a random per-process key.
	/// It is stable for the lifetime of the process only and cannot be recomputed from
	/// guessed secrets elsewhere.
	pub fn fingerprint(&self) -> String {
		let mut hasher = Sha256::new();

		hasher.update(FINGERPRINT_KEY.as_slice());

		for part in self.fingerprint_parts() {
			hasher.update(part.as_bytes());
			hasher.update([0]);
		}

		STANDARD_NO_PAD.encode(hasher.finalize())
	}

	fn fingerprint_parts(&self) -> [&str; 7] {
		let token = self.static_token.as_ref().map(TokenSecret::expose).unwrap_or_default();
		let (client_id, client_secret, exchange_id, exchange_secret) =
			match &self.client_credentials {
				Some(creds) => (
					creds.client_id.as_str(),
					creds.client_secret.expose(),
					creds.exchange_id.as_str(),
					creds.exchange_secret.expose(),
				),
				None => ("", "", "", ""),
			};

		[
			self.base_address.trim(),
			self.token_path.as_str(),
			token,
			client_id,
			client_secret,
			exchange_id,
			exchange_secret,
		]
	}
}
impl Debug for Configuration {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Configuration")
			.field("base_address", &self.base_address)
			.field("static_token_set", &self.static_token.is_some())
			.field("client_credentials", &self.client_credentials)
			.field("token_path", &self.token_path)
			.finish()
	}
}

pub(crate) fn join_endpoint(base: &Url, path: &str) -> Result<Url, ConfigError> {
	base.join(path.trim_start_matches('/'))
		.map_err(|source| ConfigError::InvalidEndpoint { path: path.to_owned(), source })
}

fn default_token_path() -> String {
	DEFAULT_TOKEN_PATH.into()
}
