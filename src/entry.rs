//! Config entries: the persisted record of one configured Bouncie application.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, EntryId, TokenRecord, TokenSecret},
	error::ConfigError,
};

/// How an entry reached its current state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
	/// Created through the user step of the config flow.
	#[default]
	User,
	/// Last written by a reauthentication flow.
	Reauth,
}

/// Application credentials collected by the config flow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
	/// Application client identifier; also the webhook shared secret.
	pub client_id: ClientId,
	/// Application client secret.
	pub client_secret: TokenSecret,
	/// Application API key.
	pub api_key: TokenSecret,
}
impl Credentials {
	/// Validates and wraps the three configuration inputs.
	pub fn new(
		client_id: impl AsRef<str>,
		client_secret: impl AsRef<str>,
		api_key: impl AsRef<str>,
	) -> Result<Self, ConfigError> {
		let client_id = ClientId::new(client_id.as_ref().trim())?;
		let client_secret = required("client_secret", client_secret.as_ref())?;
		let api_key = required("api_key", api_key.as_ref())?;

		Ok(Self { client_id, client_secret, api_key })
	}
}

/// Persisted configuration of one Bouncie application.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigEntry {
	/// Stable entry identifier.
	pub entry_id: EntryId,
	/// Deduplication key, `bouncie_<slug(client_id)>`.
	pub unique_id: String,
	/// Display title.
	pub title: String,
	/// Client identifier of the OAuth implementation that owns the entry.
	pub auth_implementation: ClientId,
	/// Application credentials.
	pub credentials: Credentials,
	/// Current OAuth tokens, if the entry has been authorized.
	pub token: Option<TokenRecord>,
	/// Origin of the latest write.
	#[serde(default)]
	pub source: EntrySource,
}

fn required(field: &'static str, value: &str) -> Result<TokenSecret, ConfigError> {
	let value = value.trim();

	if value.is_empty() {
		return Err(ConfigError::InvalidField { field, reason: "value is required".into() });
	}

	Ok(TokenSecret::new(value))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn credentials_require_every_field() {
		assert!(Credentials::new("spam-eggs", "bacon", "sausages").is_ok());
		assert!(matches!(
			Credentials::new("spam-eggs", "  ", "sausages"),
			Err(ConfigError::InvalidField { field: "client_secret", .. })
		));
		assert!(matches!(
			Credentials::new("spam-eggs", "bacon", ""),
			Err(ConfigError::InvalidField { field: "api_key", .. })
		));
		assert!(matches!(
			Credentials::new("", "bacon", "sausages"),
			Err(ConfigError::Identifier(_))
		));
	}

	#[test]
	fn credentials_debug_hides_secrets() {
		let credentials =
			Credentials::new("spam-eggs", "bacon", "sausages").expect("Credentials should build.");
		let rendered = format!("{credentials:?}");

		assert!(rendered.contains("spam-eggs"));
		assert!(!rendered.contains("bacon"));
		assert!(!rendered.contains("sausages"));
	}
}
