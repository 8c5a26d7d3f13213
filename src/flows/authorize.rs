//! Authorization Code flow: authorize URL construction and code exchange.

// self
use crate::{
	_prelude::*,
	auth::{EntryId, TokenRecord},
	error::ConfigError,
	flows::{AuthSession, common},
	http::TokenHttpClient,
	oauth::{OAuth2Facade, TransportErrorMapper},
	obs::{self, FlowKind},
	provider::GrantType,
};

const STATE_LEN: usize = 32;

/// Handshake metadata returned by [`AuthSession::start_authorization`].
#[derive(Clone, Debug)]
pub struct AuthorizationSession {
	/// Entry the resulting tokens will belong to.
	pub entry: EntryId,
	/// Opaque state value that must round-trip via the redirect handler.
	pub state: String,
	/// Redirect URI supplied when constructing the authorize URL.
	pub redirect_uri: Url,
	/// Authorize URL the user must open.
	pub authorize_url: Url,
}
impl AuthorizationSession {
	/// Validates the returned `state` parameter after the authorization redirect.
	pub fn validate_state(&self, returned_state: &str) -> Result<()> {
		if returned_state == self.state {
			Ok(())
		} else {
			Err(Error::InvalidGrant { reason: "authorization state mismatch".into() })
		}
	}
}

impl<C, M> AuthSession<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds the authorize URL (`response_type=code`, `client_id`, `redirect_uri`, `state`).
	pub fn start_authorization(
		&self,
		entry: EntryId,
		redirect_uri: Url,
	) -> Result<AuthorizationSession> {
		self.ensure_authorization_supported()?;

		let _span = obs::FlowSpan::new(FlowKind::Authorization, "start_authorization").entered();
		let state = common::random_string(STATE_LEN);
		let authorize_url = self.facade()?.authorize_url(&state, &redirect_uri)?;

		Ok(AuthorizationSession { entry, state, redirect_uri, authorize_url })
	}

	/// Exchanges the returned authorization code for tokens.
	///
	/// The resulting record keeps `code` so later refreshes can replay it. Nothing is written to
	/// the store; the caller decides which entry receives the tokens.
	pub async fn exchange_code(
		&self,
		session: &AuthorizationSession,
		code: &str,
	) -> Result<TokenRecord> {
		obs::observe(FlowKind::Authorization, "exchange_code", async {
			self.ensure_authorization_supported()?;

			let code = code.trim();

			if code.is_empty() {
				return Err(ConfigError::MissingAuthorizationCode.into());
			}

			self.facade()?
				.exchange_authorization_code(
					self.strategy.as_ref(),
					session.entry.clone(),
					code,
					&session.redirect_uri,
				)
				.await
		})
		.await
	}

	fn ensure_authorization_supported(&self) -> Result<()> {
		if self.descriptor.supports(GrantType::AuthorizationCode) {
			Ok(())
		} else {
			Err(ConfigError::UnsupportedGrant {
				descriptor: self.descriptor.id.to_string(),
				grant: "authorization_code",
			}
			.into())
		}
	}
}
