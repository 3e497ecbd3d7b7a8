//! Crate-level error types shared across the limiter, transports, caches, and the provider.

// self
use crate::{_prelude::*, cache::CacheError, context::CancelError, rate::MalformedHeader};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Rate limit headers were missing or not decimal integers.
	#[error(transparent)]
	MalformedHeader(#[from] MalformedHeader),
	/// Token cache failure (load, serialization, or an unset token).
	#[error("{0}")]
	Cache(
		#[from]
		#[source]
		CacheError,
	),
	/// Cancellation or deadline expiry observed while waiting or during I/O.
	#[error(transparent)]
	Canceled(#[from] CancelError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Token endpoint exchange or refresh failed.
	#[error(transparent)]
	Exchange(#[from] ExchangeError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Authorization succeeded in memory but the token could not be persisted.
	#[error("Authorization succeeded but the token could not be persisted.")]
	CachePersist {
		/// Underlying cache failure.
		#[source]
		source: CacheError,
	},
	/// No token source is available; the authorization flow must run first.
	#[error("Client is not authorized yet.")]
	Unauthorized,
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Endpoint or redirect URL cannot be parsed.
	#[error("Configured URL `{url}` is invalid.")]
	InvalidUrl {
		/// Offending URL string.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Rate limit header name is not a valid HTTP header name.
	#[error("`{name}` is not a valid header name.")]
	InvalidHeaderName {
		/// Offending header name.
		name: String,
	},
	/// Token cannot be rendered into an `Authorization` header value.
	#[error("Token cannot be encoded as an Authorization header.")]
	InvalidAuthorizationHeader,
	/// Required environment variable is not set.
	#[error("Environment variable `{0}` is not set.")]
	MissingEnv(&'static str),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

/// Token endpoint failures raised by the authorization-code and refresh-token grants.
#[derive(Debug, ThisError)]
pub enum ExchangeError {
	/// Token endpoint answered with an OAuth error payload.
	#[error("Token endpoint rejected the {grant} grant: {error}.")]
	Rejected {
		/// Grant label.
		grant: &'static str,
		/// OAuth `error` field.
		error: String,
		/// OAuth `error_description` field, when supplied.
		description: Option<String>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON for the {grant} grant.")]
	Parse {
		/// Grant label.
		grant: &'static str,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Network failure while calling the token endpoint.
	#[error("Network error occurred while calling the token endpoint for the {grant} grant.")]
	Network {
		/// Grant label.
		grant: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Anything else the OAuth client reported.
	#[error("Token endpoint returned an unexpected response for the {grant} grant: {message}.")]
	Unexpected {
		/// Grant label.
		grant: &'static str,
		/// Human-readable failure summary.
		message: String,
	},
	/// The held token expired and cannot be refreshed.
	#[error("Token has expired and carries no refresh token.")]
	MissingRefreshToken,
}

/// Transport-level failures (network, IO) on API requests.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
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
	fn cache_persist_exposes_cache_error_as_source() {
		let cache_error = CacheError::Persist { message: "disk full".into() };
		let error = Error::CachePersist { source: cache_error.clone() };
		let source =
			StdError::source(&error).expect("Cache persist error should expose its source.");

		assert_eq!(source.to_string(), cache_error.to_string());
		assert!(!error.to_string().contains("disk full"));
	}

	#[test]
	fn cache_error_converts_into_crate_error() {
		let error: Error = CacheError::Uninitialized.into();

		assert!(matches!(error, Error::Cache(CacheError::Uninitialized)));
		assert!(error.to_string().contains("not been initialized"));
	}
}
