//! Token refresh with singleflight guards, compare-and-swap persistence, and metrics.
//!
//! [`AuthSession::ensure_token_valid`] returns the entry's token untouched while it is fresh.
//! Otherwise it refreshes under a per-entry guard: providers flagged with
//! `refresh_with_authorization_code` get the original authorization code replayed through the
//! `authorization_code` grant, everyone else gets a standard `refresh_token` grant. The response
//! is merged over the stored record and written back with
//! [`EntryStore::compare_and_swap_token`]. Rejected grants revoke the stored record so setup
//! can start a reauthentication.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::TokenRecord,
	error::ConfigError,
	flows::{AuthSession, TokenRequest, common},
	http::TokenHttpClient,
	oauth::{OAuth2Facade, TransportErrorMapper},
	obs::{self, FlowKind},
	provider::GrantType,
	store::{CompareAndSwapOutcome, EntryStore},
};

impl<C, M> AuthSession<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Returns a valid token for the requested entry, refreshing it when needed.
	pub async fn ensure_token_valid(&self, request: TokenRequest) -> Result<TokenRecord> {
		obs::observe(FlowKind::Refresh, "ensure_token_valid", async move {
			self.refresh_metrics.record_attempt();

			let result = self.refresh_locked(&request).await;

			match &result {
				Ok(_) => self.refresh_metrics.record_success(),
				Err(_) => self.refresh_metrics.record_failure(),
			}

			result
		})
		.await
	}

	async fn refresh_locked(&self, request: &TokenRequest) -> Result<TokenRecord> {
		let guard = common::flow_guard(self, &request.entry);
		let _singleflight = guard.lock().await;
		let now = OffsetDateTime::now_utc();
		let entry = <dyn EntryStore>::fetch(self.store.as_ref(), &request.entry)
			.await?
			.ok_or_else(|| Error::UnknownEntry(request.entry.to_string()))?;
		let current = entry.token.ok_or_else(|| Error::ReauthRequired(request.entry.to_string()))?;

		if current.is_revoked() {
			return Err(Error::ReauthRequired(request.entry.to_string()));
		}
		if !request.should_refresh(&current, now) {
			return Ok(current);
		}

		let issued = match self.request_refresh(&current).await {
			Ok(record) => record,
			Err(err) => {
				if matches!(err, Error::InvalidGrant { .. } | Error::Revoked) {
					tracing::warn!(entry = %request.entry, "Provider rejected the stored grant.");

					<dyn EntryStore>::revoke_token(self.store.as_ref(), &request.entry, now)
						.await?;
				}

				return Err(err);
			},
		};
		let expected_access = current.access_token.expose().to_owned();
		let merged = current.merge(issued);
		let outcome = <dyn EntryStore>::compare_and_swap_token(
			self.store.as_ref(),
			&request.entry,
			Some(expected_access.as_str()),
			merged.clone(),
		)
		.await?;

		match outcome {
			CompareAndSwapOutcome::Updated => {
				tracing::debug!(
					entry = %request.entry,
					expires_at = %merged.expires_at,
					"Token refreshed."
				);

				Ok(merged)
			},
			// Another writer replaced the token first; theirs wins.
			CompareAndSwapOutcome::TokenMismatch =>
				<dyn EntryStore>::fetch(self.store.as_ref(), &request.entry)
					.await?
					.and_then(|entry| entry.token)
					.ok_or_else(|| Error::ReauthRequired(request.entry.to_string())),
			CompareAndSwapOutcome::Missing => Err(Error::UnknownEntry(request.entry.to_string())),
		}
	}

	async fn request_refresh(&self, current: &TokenRecord) -> Result<TokenRecord> {
		let facade = self.facade()?;

		if self.descriptor.quirks.refresh_with_authorization_code {
			let code =
				current.authorization_code.as_ref().ok_or(ConfigError::MissingAuthorizationCode)?;
			let redirect_uri = self.redirect_uri.as_ref().ok_or(ConfigError::MissingRedirectUri)?;

			return facade
				.exchange_authorization_code(
					self.strategy.as_ref(),
					current.entry.clone(),
					code.expose(),
					redirect_uri,
				)
				.await;
		}
		if !self.descriptor.supports(GrantType::RefreshToken) {
			return Err(ConfigError::UnsupportedGrant {
				descriptor: self.descriptor.id.to_string(),
				grant: "refresh_token",
			}
			.into());
		}

		let refresh = current.refresh_token.as_ref().ok_or(ConfigError::MissingRefreshToken)?;

		facade.refresh_token(self.strategy.as_ref(), current.entry.clone(), refresh.expose()).await
	}
}
