//! Token error classification for the authorization server.
//!
//! Bouncie answers a replayed or expired authorization code with a `400`, sometimes with an OAuth
//! `error` field and sometimes with only a description. The strategy folds those shapes into the
//! three outcomes the session cares about.

// self
use crate::{_prelude::*, provider::descriptor::GrantType};

/// Hooks a provider exposes to the OAuth session.
pub trait ProviderStrategy: Send + Sync {
	/// Decides what a failed token request means for the entry.
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind;
}

/// Outcome of a failed token request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
	/// The code (or refresh token) is no longer accepted; the user must authorize again.
	InvalidGrant,
	/// The client credentials were rejected.
	InvalidClient,
	/// Anything worth trying again on the next poll.
	Transient,
}

/// Facts about a failed token request, stripped of any HTTP client types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// Grant that was being exchanged.
	pub grant_type: GrantType,
	/// Response status, when a response arrived.
	pub http_status: Option<u16>,
	/// OAuth `error` field.
	pub oauth_error: Option<String>,
	/// OAuth `error_description` field.
	pub error_description: Option<String>,
}
impl ProviderErrorContext {
	/// Starts an empty context for `grant_type`.
	pub fn new(grant_type: GrantType) -> Self {
		Self { grant_type, http_status: None, oauth_error: None, error_description: None }
	}

	/// Records the response status.
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Records the OAuth `error` field.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Records the OAuth `error_description` field.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}
}

/// Strategy used for the Bouncie authorization server and its mocks.
///
/// Only a `400` or `401` answer can reject the grant or the client; every other status is
/// transient whatever the body says. Within those two statuses the OAuth `error` code decides
/// first, then an OAuth code named in the description, then the status itself.
#[derive(Debug, Default)]
pub struct DefaultProviderStrategy;
impl Display for DefaultProviderStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("default-provider-strategy")
	}
}
impl ProviderStrategy for DefaultProviderStrategy {
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		if ctx.http_status.is_some_and(|status| !matches!(status, 400 | 401)) {
			return ProviderErrorKind::Transient;
		}

		ctx.oauth_error
			.as_deref()
			.and_then(kind_of_code)
			.or_else(|| ctx.error_description.as_deref().and_then(kind_of_description))
			.unwrap_or_else(|| kind_of_status(ctx.http_status))
	}
}

fn kind_of_code(code: &str) -> Option<ProviderErrorKind> {
	let kind = match code.trim().to_ascii_lowercase().as_str() {
		"invalid_grant" | "access_denied" | "invalid_request" => ProviderErrorKind::InvalidGrant,
		"invalid_client" | "unauthorized_client" => ProviderErrorKind::InvalidClient,
		"temporarily_unavailable" | "server_error" => ProviderErrorKind::Transient,
		_ => return None,
	};

	Some(kind)
}

fn kind_of_description(description: &str) -> Option<ProviderErrorKind> {
	description
		.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
		.filter(|word| !word.is_empty())
		.find_map(kind_of_code)
}

fn kind_of_status(status: Option<u16>) -> ProviderErrorKind {
	match status {
		Some(400) => ProviderErrorKind::InvalidGrant,
		Some(401) => ProviderErrorKind::InvalidClient,
		_ => ProviderErrorKind::Transient,
	}
}
