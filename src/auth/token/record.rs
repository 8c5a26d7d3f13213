//! Token records persisted alongside each config entry, plus their builder.

// self
use crate::{
	_prelude::*,
	auth::{EntryId, token::secret::TokenSecret},
};

/// Current lifecycle status for a token record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token is not yet valid because the issued-at instant is in the future.
	Pending,
	/// Token is currently valid.
	Active,
	/// Token exceeded its expiry instant.
	Expired,
	/// Token has been revoked locally or by the provider.
	Revoked,
}

/// Errors produced by [`TokenRecordBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenRecordBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
}

/// OAuth tokens held by one config entry.
///
/// Bouncie refreshes by replaying the original authorization code, so the record keeps that code
/// next to the issued secrets for the lifetime of the entry.
#[derive(Serialize, Deserialize, Clone)]
pub struct TokenRecord {
	/// Entry owning the record.
	pub entry: EntryId,
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token secret, if the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Authorization code the record was originally exchanged from.
	pub authorization_code: Option<TokenSecret>,
	/// Token type reported by the provider (usually `Bearer`).
	pub token_type: Option<String>,
	/// Issued-at instant recorded from the provider response.
	pub issued_at: OffsetDateTime,
	/// Expiry instant derived from issued_at plus expires_in or absolute expiry.
	pub expires_at: OffsetDateTime,
	/// Revocation instant if the record has been revoked.
	pub revoked_at: Option<OffsetDateTime>,
}
impl TokenRecord {
	/// Returns a builder bound to `entry`.
	pub fn builder(entry: EntryId) -> TokenRecordBuilder {
		TokenRecordBuilder::new(entry)
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> TokenStatus {
		if self.revoked_at.is_some() {
			return TokenStatus::Revoked;
		}
		if instant < self.issued_at {
			return TokenStatus::Pending;
		}
		if instant >= self.expires_at {
			return TokenStatus::Expired;
		}

		TokenStatus::Active
	}

	/// Convenience helper that checks the status using the current UTC instant.
	pub fn status(&self) -> TokenStatus {
		self.status_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` if the record has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), TokenStatus::Expired)
	}

	/// Returns `true` if the record has been revoked.
	pub fn is_revoked(&self) -> bool {
		self.revoked_at.is_some()
	}

	/// Marks the record as revoked.
	pub fn revoke(&mut self, instant: OffsetDateTime) {
		self.revoked_at = Some(instant);
	}

	/// Layers a freshly issued record over this one.
	///
	/// Fields the provider omitted from the new response (refresh token, authorization code,
	/// token type) keep their previous values.
	pub fn merge(self, newer: TokenRecord) -> TokenRecord {
		TokenRecord {
			entry: self.entry,
			access_token: newer.access_token,
			refresh_token: newer.refresh_token.or(self.refresh_token),
			authorization_code: newer.authorization_code.or(self.authorization_code),
			token_type: newer.token_type.or(self.token_type),
			issued_at: newer.issued_at,
			expires_at: newer.expires_at,
			revoked_at: None,
		}
	}
}
impl Debug for TokenRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRecord")
			.field("entry", &self.entry)
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("authorization_code", &self.authorization_code.as_ref().map(|_| "<redacted>"))
			.field("token_type", &self.token_type)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.field("revoked_at", &self.revoked_at)
			.finish()
	}
}

/// Builder for [`TokenRecord`].
#[derive(Clone, Debug)]
pub struct TokenRecordBuilder {
	entry: EntryId,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	authorization_code: Option<TokenSecret>,
	token_type: Option<String>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl TokenRecordBuilder {
	fn new(entry: EntryId) -> Self {
		Self {
			entry,
			access_token: None,
			refresh_token: None,
			authorization_code: None,
			token_type: None,
			issued_at: None,
			expires_at: None,
			expires_in: None,
		}
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Convenience helper that stamps `issued_at` with the current clock.
	pub fn issued_now(self) -> Self {
		self.issued_at(OffsetDateTime::now_utc())
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Records the authorization code the tokens were exchanged from.
	pub fn authorization_code(mut self, code: impl Into<String>) -> Self {
		self.authorization_code = Some(TokenSecret::new(code));

		self
	}

	/// Records the provider-reported token type.
	pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = Some(token_type.into());

		self
	}

	/// Consumes the builder and produces a [`TokenRecord`].
	pub fn build(self) -> Result<TokenRecord, TokenRecordBuilderError> {
		let access_token = self.access_token.ok_or(TokenRecordBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => issued_at + delta,
			(None, None) => return Err(TokenRecordBuilderError::MissingExpiry),
		};

		Ok(TokenRecord {
			entry: self.entry,
			access_token,
			refresh_token: self.refresh_token,
			authorization_code: self.authorization_code,
			token_type: self.token_type,
			issued_at,
			expires_at,
			revoked_at: None,
		})
	}
}
