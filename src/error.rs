//! Bridge-level error types shared across flows, the REST client, stores, and setup.

// self
use crate::_prelude::*;

/// Bridge-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; the next scheduled attempt may succeed.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Bouncie REST API answered with a non-success status.
	#[error("Bouncie API returned HTTP {status} for {url}.")]
	Api {
		/// HTTP status code returned by the API.
		status: u16,
		/// Request URL.
		url: String,
	},
	/// Vehicle refresh failed; the coordinator keeps its previous data.
	#[error("Vehicle data update failed.")]
	UpdateFailed(#[source] Box<Error>),
	/// Provider rejected the grant (e.g., a stale authorization code).
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider- or bridge-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider- or bridge-supplied reason string.
		reason: String,
	},
	/// Token has been revoked and must not be reused.
	#[error("Token has been revoked.")]
	Revoked,
	/// Entry holds no usable authorization and must be reauthenticated.
	#[error("Config entry `{0}` requires reauthentication.")]
	ReauthRequired(String),
	/// No config entry exists for the identifier.
	#[error("Config entry `{0}` does not exist.")]
	UnknownEntry(String),
}
impl Error {
	/// Returns `true` when the failure means the stored authorization is no longer accepted.
	///
	/// Only HTTP `400`/`401` answers and provider grant/client rejections qualify; every other
	/// failure aborts setup without prompting for reauthentication.
	pub fn requires_reauth(&self) -> bool {
		match self {
			Self::Api { status, .. } => matches!(status, 400 | 401),
			Self::InvalidGrant { .. }
			| Self::InvalidClient { .. }
			| Self::Revoked
			| Self::ReauthRequired(_) => true,
			Self::UpdateFailed(inner) => inner.requires_reauth(),
			_ => false,
		}
	}
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
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Provider descriptor contains an invalid URL.
	#[error("Descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Provider descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] crate::provider::ProviderDescriptorError),
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// No externally reachable URL is configured, so no redirect URI can be derived.
	#[error("No external URL is configured for the OAuth redirect.")]
	NoExternalUrl,
	/// External URL uses plain HTTP on a non-loopback host.
	#[error("External URL must use HTTPS unless it points at a loopback host: {url}.")]
	InsecureExternalUrl {
		/// External URL that failed validation.
		url: String,
	},
	/// Service configuration file could not be read.
	#[error("Failed to read configuration file {path}.")]
	ReadFile {
		/// File that failed to load.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Service configuration file could not be parsed.
	#[error("Failed to parse configuration file {path}.")]
	ParseFile {
		/// File that failed to parse.
		path: String,
		/// Underlying TOML failure.
		#[source]
		source: toml::de::Error,
	},
	/// A required configuration field is missing or malformed.
	#[error("Configuration field `{field}` is invalid: {reason}.")]
	InvalidField {
		/// Field name as collected by the setup form.
		field: &'static str,
		/// Human-readable reason.
		reason: String,
	},

	/// Descriptor does not enable the requested grant.
	#[error("Descriptor `{descriptor}` does not enable the {grant} grant.")]
	UnsupportedGrant {
		/// Provider identifier string.
		descriptor: String,
		/// Disabled grant label.
		grant: &'static str,
	},
	/// Stored token lacks the authorization code replayed by the vendor's refresh.
	#[error("Stored token is missing the authorization code used for refreshes.")]
	MissingAuthorizationCode,
	/// Stored token lacks a refresh secret.
	#[error("Stored token is missing a refresh token.")]
	MissingRefreshToken,
	/// Refresh requires a redirect URI but the session has none.
	#[error("Session has no redirect URI configured.")]
	MissingRedirectUri,
	/// Identifier validation failed.
	#[error(transparent)]
	Identifier(#[from] crate::auth::IdentifierError),
	/// Token record builder validation failed.
	#[error("Unable to build token record.")]
	TokenBuild(#[from] crate::auth::TokenRecordBuilderError),
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<reqwest::Error> for ConfigError {
	fn from(e: reqwest::Error) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants.
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or bridge-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint or API responded with JSON that could not be parsed.
	#[error("{endpoint} returned malformed JSON.")]
	ResponseParse {
		/// Endpoint label (token endpoint, user, vehicles).
		endpoint: &'static str,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}
/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the Bouncie cloud.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the Bouncie cloud.")]
	Io(#[from] std::io::Error),
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

	fn api(status: u16) -> Error {
		Error::Api { status, url: "https://api.bouncie.dev/v1/user".into() }
	}

	#[test]
	fn reauth_only_for_bad_request_and_unauthorized() {
		assert!(api(400).requires_reauth());
		assert!(api(401).requires_reauth());
		assert!(!api(403).requires_reauth());
		assert!(!api(404).requires_reauth());
		assert!(!api(500).requires_reauth());
		assert!(!api(503).requires_reauth());
	}

	#[test]
	fn reauth_for_rejected_grants_but_not_transient_failures() {
		assert!(Error::InvalidGrant { reason: "stale code".into() }.requires_reauth());
		assert!(Error::InvalidClient { reason: "bad secret".into() }.requires_reauth());

		let transient = Error::from(TransientError::TokenEndpoint {
			message: "temporarily_unavailable".into(),
			status: Some(503),
			retry_after: None,
		});

		assert!(!transient.requires_reauth());
		assert!(Error::UpdateFailed(Box::new(api(401))).requires_reauth());
		assert!(!Error::UpdateFailed(Box::new(api(502))).requires_reauth());
	}
}
