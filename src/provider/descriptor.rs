//! Provider descriptor data structures and helpers shared by all flows.

/// Builder API for assembling provider descriptors.
pub mod builder;
/// Grant helpers wired into provider descriptors.
pub mod grant;
/// Provider-specific quirk toggles.
pub mod quirks;

pub use builder::*;
pub use grant::*;
pub use quirks::*;

// self
use crate::{_prelude::*, auth::ProviderId};

/// Bouncie authorize endpoint.
pub const BOUNCIE_AUTHORIZE_URL: &str = "https://auth.bouncie.com/dialog/authorize";
/// Bouncie token endpoint.
pub const BOUNCIE_TOKEN_URL: &str = "https://auth.bouncie.com/oauth/token";

/// Preferred client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
}

/// Endpoint set declared by a provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Authorization endpoint the user is redirected to.
	pub authorization: Url,
	/// Token endpoint used for exchanges and refreshes.
	pub token: Url,
}

/// Immutable provider descriptor consumed by flows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Descriptor identifier.
	pub id: ProviderId,
	/// Endpoint definitions exposed by the provider.
	pub endpoints: ProviderEndpoints,
	/// Supported grant flags.
	pub supported_grants: SupportedGrants,
	/// Preferred client authentication mechanism.
	pub preferred_client_auth_method: ClientAuthMethod,
	/// Provider-specific quirks.
	pub quirks: ProviderQuirks,
}
impl ProviderDescriptor {
	/// Creates a new builder for the provided identifier.
	pub fn builder(id: ProviderId) -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::new(id)
	}

	/// Descriptor for the Bouncie cloud.
	///
	/// Bouncie expects the client secret in the form body and refreshes by replaying the
	/// original authorization code.
	pub fn bouncie() -> Result<Self> {
		let parse = |raw: &str| {
			Url::parse(raw)
				.map_err(|source| crate::error::ConfigError::InvalidDescriptor { source })
		};
		let id = ProviderId::new("bouncie").map_err(crate::error::ConfigError::from)?;
		let descriptor = Self::builder(id)
			.authorization_endpoint(parse(BOUNCIE_AUTHORIZE_URL)?)
			.token_endpoint(parse(BOUNCIE_TOKEN_URL)?)
			.support_grant(GrantType::AuthorizationCode)
			.preferred_client_auth_method(ClientAuthMethod::ClientSecretPost)
			.quirks(ProviderQuirks { refresh_with_authorization_code: true })
			.build()
			.map_err(crate::error::ConfigError::from)?;

		Ok(descriptor)
	}

	/// Checks whether the descriptor supports a given grant.
	pub fn supports(&self, grant: GrantType) -> bool {
		self.supported_grants.supports(grant)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn bouncie_descriptor_posts_secret_and_replays_code() {
		let descriptor = ProviderDescriptor::bouncie().expect("Bouncie descriptor should build.");

		assert_eq!(descriptor.id.as_ref(), "bouncie");
		assert_eq!(descriptor.endpoints.authorization.as_str(), BOUNCIE_AUTHORIZE_URL);
		assert_eq!(descriptor.endpoints.token.as_str(), BOUNCIE_TOKEN_URL);
		assert_eq!(descriptor.preferred_client_auth_method, ClientAuthMethod::ClientSecretPost);
		assert!(descriptor.quirks.refresh_with_authorization_code);
		assert!(descriptor.supports(GrantType::AuthorizationCode));
		assert!(!descriptor.supports(GrantType::RefreshToken));
	}
}
