//! Service configuration: command-line flags layered over a TOML file.
//!
//! ```toml
//! external_url = "https://bridge.example.com"
//! listen = "0.0.0.0:8123"
//! poll_interval_secs = 3600
//! store_path = "entries.json"
//!
//! [api]
//! authorization_scheme = "bearer"
//!
//! [[entries]]
//! client_id = "my-app"
//! client_secret = "..."
//! api_key = "..."
//! ```

// std
use std::{fs, net::SocketAddr, path::PathBuf, time::Duration as StdDuration};
// crates.io
use clap::Parser;
// self
use crate::{
	_prelude::*,
	api::{ApiEndpoints, AuthorizationScheme},
	auth::TokenSecret,
	coordinator::{self, DEFAULT_UPDATE_INTERVAL},
	entry::Credentials,
	error::ConfigError,
	provider::descriptor::is_loopback,
};

/// Path of the OAuth redirect handler below the external URL.
pub const AUTH_CALLBACK_PATH: &str = "/auth/external/callback";
/// Listen address used when none is configured.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:8123";

/// Bouncie vehicle telemetry bridge.
#[derive(Debug, Parser)]
#[command(name = "bouncie-bridge", version, about)]
pub struct Cli {
	/// TOML configuration file.
	#[arg(long, short, env = "BOUNCIE_CONFIG")]
	pub config: Option<PathBuf>,

	/// Address to serve the webhook and OAuth callback on.
	#[arg(long, env = "BOUNCIE_LISTEN")]
	pub listen: Option<SocketAddr>,

	/// Externally reachable base URL of this service.
	#[arg(long, env = "BOUNCIE_EXTERNAL_URL")]
	pub external_url: Option<Url>,
}

/// REST client settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiSettings {
	/// How the access token is sent.
	pub authorization_scheme: AuthorizationScheme,
	/// Override of the REST base URL; must end with a slash.
	pub base_url: Option<Url>,
}

/// Application credentials listed in the configuration file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntrySettings {
	/// Application client identifier.
	pub client_id: String,
	/// Application client secret.
	pub client_secret: TokenSecret,
	/// Application API key.
	pub api_key: TokenSecret,
}
impl EntrySettings {
	/// Validated credentials.
	pub fn credentials(&self) -> Result<Credentials, ConfigError> {
		Credentials::new(&self.client_id, self.client_secret.expose(), self.api_key.expose())
	}
}

/// Complete service configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
	/// Externally reachable base URL; OAuth redirects land below it.
	pub external_url: Option<Url>,
	/// Listen address.
	pub listen: SocketAddr,
	/// Vehicle poll cadence in seconds.
	pub poll_interval_secs: u64,
	/// JSON file holding config entries; entries stay in memory when unset.
	pub store_path: Option<PathBuf>,
	/// REST client settings.
	pub api: ApiSettings,
	/// Applications to authorize at startup.
	pub entries: Vec<EntrySettings>,
}
impl Settings {
	/// Reads and parses a TOML file.
	pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
		let path = path.into();
		let raw = fs::read_to_string(&path)
			.map_err(|source| ConfigError::ReadFile { path: path.display().to_string(), source })?;

		Self::from_toml(&raw, &path.display().to_string())
	}

	/// Parses TOML text; `origin` labels errors.
	pub fn from_toml(raw: &str, origin: &str) -> Result<Self, ConfigError> {
		toml::from_str(raw).map_err(|source| ConfigError::ParseFile { path: origin.into(), source })
	}

	/// Loads the file named by `cli` (defaults otherwise) and applies the flag overrides.
	pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
		let mut settings = match &cli.config {
			Some(path) => Self::load(path)?,
			None => Self::default(),
		};

		settings.apply_cli(cli);

		Ok(settings)
	}

	/// Applies command-line overrides.
	pub fn apply_cli(&mut self, cli: &Cli) {
		if let Some(listen) = cli.listen {
			self.listen = listen;
		}
		if let Some(external_url) = &cli.external_url {
			self.external_url = Some(external_url.clone());
		}
	}

	/// Poll cadence, never below the coordinator minimum.
	pub fn poll_interval(&self) -> StdDuration {
		coordinator::clamp_interval(StdDuration::from_secs(self.poll_interval_secs))
	}

	/// OAuth redirect URI, `<external_url>/auth/external/callback`.
	pub fn redirect_uri(&self) -> Result<Url, ConfigError> {
		let external = self.external_url.as_ref().ok_or(ConfigError::NoExternalUrl)?;

		redirect_uri_for(external)
	}

	/// REST endpoints, honoring the base URL override.
	pub fn api_endpoints(&self) -> Result<ApiEndpoints> {
		match &self.api.base_url {
			Some(base) => ApiEndpoints::with_base(base),
			None => ApiEndpoints::bouncie(),
		}
	}
}
impl Default for Settings {
	fn default() -> Self {
		Self {
			external_url: None,
			listen: SocketAddr::from(([0, 0, 0, 0], 8123)),
			poll_interval_secs: DEFAULT_UPDATE_INTERVAL.as_secs(),
			store_path: None,
			api: ApiSettings::default(),
			entries: Vec::new(),
		}
	}
}

/// Appends [`AUTH_CALLBACK_PATH`] to `external`, keeping any path prefix.
///
/// Only loopback hosts may use plain HTTP.
pub fn redirect_uri_for(external: &Url) -> Result<Url, ConfigError> {
	if external.scheme() != "https" && !(external.scheme() == "http" && is_loopback(external)) {
		return Err(ConfigError::InsecureExternalUrl { url: external.to_string() });
	}

	let joined = format!("{}{AUTH_CALLBACK_PATH}", external.as_str().trim_end_matches('/'));

	Url::parse(&joined).map_err(|source| ConfigError::InvalidRedirect { source })
}
