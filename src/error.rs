//! Cache-level error types shared across configuration, credential strategies, and the prober.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Configuration problem detected before any network activity.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Authentication retry budget exhausted.
	#[error(transparent)]
	Authentication(#[from] AuthenticationError),
	/// Temporary upstream failure reported by the bootstrap channel.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS) reported by the bootstrap channel.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Bootstrap channel rejected the client credentials.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Upstream- or cache-supplied reason string.
		reason: String,
	},
	/// Caller deadline elapsed before a session handle was available.
	#[error("No session handle was available within {after:?}.")]
	Timeout {
		/// Deadline that was exceeded.
		after: StdDuration,
	},
}
impl Error {
	/// Returns `true` when the error was raised before any I/O because of bad configuration.
	pub fn is_config(&self) -> bool {
		matches!(self, Self::Config(_))
	}

	/// Returns `true` when the prober exhausted its retry budget.
	pub fn is_authentication(&self) -> bool {
		matches!(self, Self::Authentication(_))
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Base address is empty or whitespace.
	#[error("Base address is required.")]
	MissingBaseAddress,
	/// Base address cannot be parsed as an absolute URL.
	#[error("Base address `{value}` is invalid.")]
	InvalidBaseAddress {
		/// Raw base address value.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Neither a static token nor client credentials were supplied.
	#[error("Either a static token or a complete client-credential set is required.")]
	MissingCredentials,
	/// Client credentials were supplied without one of the required fields.
	#[error("Client credentials are incomplete: `{field}` is empty.")]
	IncompleteClientCredentials {
		/// Name of the first empty field.
		field: &'static str,
	},
	/// An endpoint path cannot be joined onto the base address.
	#[error("Endpoint `{path}` cannot be resolved against the base address.")]
	InvalidEndpoint {
		/// Path that failed to resolve.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A caller asked for a connection with a configuration the cache is not bound to.
	#[error(
		"Cache is bound to configuration `{bound}` but `{requested}` was requested; call reconfigure to switch."
	)]
	ConfigurationMismatch {
		/// Fingerprint of the bound configuration.
		bound: String,
		/// Fingerprint of the requested configuration.
		requested: String,
	},
	/// Client credentials were selected but no bootstrap connector is available.
	#[error("No bootstrap connector is configured for the client-credential exchange.")]
	MissingConnector,
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[cfg(feature = "reqwest")]
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Raised once the prober gives up on a credential strategy.
#[derive(Debug, ThisError)]
#[error("Authentication failed after {attempts} attempt(s): {cause}")]
pub struct AuthenticationError {
	/// Number of token requests issued before giving up.
	pub attempts: u32,
	/// Outcome of the final attempt.
	#[source]
	pub cause: AuthenticationCause,
}

/// Why the final authentication attempt failed.
#[derive(Debug, ThisError)]
pub enum AuthenticationCause {
	/// The credential strategy returned an error.
	#[error(transparent)]
	Failed(Box<Error>),
	/// The credential strategy returned an empty token without an error.
	#[error("authentication succeeded but returned no usable token")]
	EmptyToken,
}
impl AuthenticationCause {
	/// Returns the wrapped strategy error, if any.
	pub fn error(&self) -> Option<&Error> {
		match self {
			Self::Failed(err) => Some(err),
			Self::EmptyToken => None,
		}
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Token endpoint returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Upstream- or cache-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}
impl TransientError {
	/// HTTP status attached to the failure, when known.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::TokenEndpoint { status, .. } | Self::TokenResponseParse { status, .. } => *status,
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn authentication_error_exposes_last_failure_as_source() {
		let inner = Error::InvalidClient { reason: "bad secret".into() };
		let err: Error = AuthenticationError {
			attempts: 3,
			cause: AuthenticationCause::Failed(Box::new(inner)),
		}
		.into();

		assert!(err.is_authentication());
		assert!(err.to_string().contains("3 attempt(s)"));
		assert!(err.to_string().contains("bad secret"));

		let Error::Authentication(auth) = &err else {
			panic!("Expected an authentication error.");
		};

		assert!(matches!(auth.cause.error(), Some(Error::InvalidClient { .. })));
	}

	#[test]
	fn empty_token_cause_is_descriptive() {
		let err = AuthenticationError { attempts: 3, cause: AuthenticationCause::EmptyToken };

		assert!(err.to_string().contains("authentication succeeded but returned no usable token"));
		assert!(err.cause.error().is_none());
	}

	#[test]
	fn config_errors_are_flagged() {
		let err: Error = ConfigError::MissingBaseAddress.into();

		assert!(err.is_config());
		assert!(!err.is_authentication());
	}
}
