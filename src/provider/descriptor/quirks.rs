// self
use crate::_prelude::*;

/// Provider-specific quirks that influence how flows behave.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderQuirks {
	/// Refresh by re-submitting the `authorization_code` grant with the stored code instead of
	/// the `refresh_token` grant.
	pub refresh_with_authorization_code: bool,
}
