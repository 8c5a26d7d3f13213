//! Bouncie vehicle telemetry bridge: OAuth 2.0 sessions with the vendor's code-replay refresh,
//! scheduled vehicle polling, authenticated webhook intake, and per-vehicle tracker and sensor
//! entities composed over one shared state.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod auth;
pub mod bus;
pub mod config;
pub mod config_flow;
pub mod coordinator;
pub mod entity;
pub mod entry;
pub mod error;
pub mod flows;
pub mod http;
pub mod integration;
pub mod model;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod registry;
pub mod server;
pub mod store;
pub mod webhook;
#[cfg(any(test, feature = "test"))]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and fixtures for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		api::{ApiEndpoints, BouncieApi, StaticToken},
		auth::{ClientId, EntryId, ProviderId, TokenRecord, TokenSecret},
		config::{ApiSettings, Settings},
		coordinator::{DEFAULT_UPDATE_INTERVAL, VehiclesCoordinator},
		entry::{ConfigEntry, Credentials, EntrySource},
		flows::AuthSession,
		http::ReqwestHttpClient,
		integration::Integration,
		oauth::ReqwestTransportErrorMapper,
		provider::{
			ClientAuthMethod, DefaultProviderStrategy, GrantType, ProviderDescriptor,
			ProviderQuirks, ProviderStrategy,
		},
		store::{EntryStore, MemoryStore},
	};

	/// Session type alias used by reqwest-backed integration tests.
	pub type ReqwestTestSession = AuthSession<ReqwestHttpClient, ReqwestTransportErrorMapper>;

	/// Client identifier shared by fixtures.
	pub const TEST_CLIENT_ID: &str = "spam-eggs";
	/// Client secret shared by fixtures.
	pub const TEST_CLIENT_SECRET: &str = "bacon";
	/// API key shared by fixtures.
	pub const TEST_API_KEY: &str = "sausages";
	/// VIN of [`sample_vehicle`].
	pub const TEST_VIN: &str = "ABCDEFG123456NOP7";

	/// Builds the credentials used across fixtures.
	pub fn test_credentials() -> Credentials {
		Credentials::new(TEST_CLIENT_ID, TEST_CLIENT_SECRET, TEST_API_KEY)
			.expect("Fixture credentials should be valid.")
	}

	/// Constructs an [`AuthSession`] backed by an in-memory store and the default strategy.
	pub fn build_reqwest_test_session(
		descriptor: ProviderDescriptor,
		redirect_uri: Url,
	) -> (ReqwestTestSession, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn EntryStore> = store_backend.clone();
		let strategy: Arc<dyn ProviderStrategy> = Arc::new(DefaultProviderStrategy);
		let session = AuthSession::with_http_client(
			store,
			descriptor,
			strategy,
			test_credentials(),
			ReqwestHttpClient::default(),
			Arc::new(ReqwestTransportErrorMapper),
		)
		.with_redirect_uri(redirect_uri);

		(session, store_backend)
	}

	/// Bouncie-shaped descriptor whose endpoints live below `base` (a mock server URL).
	pub fn mock_descriptor(base: &str) -> ProviderDescriptor {
		let endpoint = |path: &str| {
			Url::parse(&format!("{}{path}", base.trim_end_matches('/')))
				.expect("Mock endpoint should parse successfully.")
		};

		ProviderDescriptor::builder(
			ProviderId::new("mock-bouncie").expect("Provider identifier fixture should be valid."),
		)
		.authorization_endpoint(endpoint("/dialog/authorize"))
		.token_endpoint(endpoint("/oauth/token"))
		.support_grant(GrantType::AuthorizationCode)
		.preferred_client_auth_method(ClientAuthMethod::ClientSecretPost)
		.quirks(ProviderQuirks { refresh_with_authorization_code: true })
		.build()
		.expect("Mock descriptor should build successfully.")
	}

	/// Token endpoint response body.
	pub fn token_body(access: &str, expires_in: i64) -> String {
		serde_json::json!({
			"access_token": access,
			"token_type": "Bearer",
			"expires_in": expires_in,
		})
		.to_string()
	}

	/// External URL used by integration fixtures.
	pub const TEST_EXTERNAL_URL: &str = "https://bridge.example.com";

	/// Settings with [`TEST_EXTERNAL_URL`] whose REST base is `<base>/v1/`.
	pub fn test_settings(base: &str) -> Settings {
		let api_base = Url::parse(&format!("{}/v1/", base.trim_end_matches('/')))
			.expect("Mock API base should parse successfully.");

		Settings {
			external_url: Some(
				Url::parse(TEST_EXTERNAL_URL).expect("External URL fixture should parse."),
			),
			api: ApiSettings { base_url: Some(api_base), ..Default::default() },
			..Default::default()
		}
	}

	/// Integration talking to a mock Bouncie cloud at `base`, backed by an in-memory store.
	pub fn build_test_integration(
		base: &str,
		settings: Settings,
	) -> (Arc<Integration>, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn EntryStore> = store_backend.clone();
		let integration = Integration::with_descriptor(
			settings,
			store,
			ReqwestHttpClient::default(),
			mock_descriptor(base),
		);

		(Arc::new(integration), store_backend)
	}

	/// Builds a loaded config entry carrying `token`.
	pub fn test_entry(entry_id: &EntryId, token: Option<TokenRecord>) -> ConfigEntry {
		let client_id =
			ClientId::new(TEST_CLIENT_ID).expect("Fixture client identifier should be valid.");

		ConfigEntry {
			entry_id: entry_id.clone(),
			unique_id: crate::config_flow::unique_id_for(TEST_CLIENT_ID),
			title: "bouncie".into(),
			auth_implementation: client_id,
			credentials: test_credentials(),
			token,
			source: EntrySource::User,
		}
	}

	/// Builds a token record for `entry_id` that stays valid for `expires_in`.
	pub fn test_token(entry_id: &EntryId, access: &str, expires_in: Duration) -> TokenRecord {
		let issued = OffsetDateTime::now_utc() - Duration::minutes(5);

		TokenRecord::builder(entry_id.clone())
			.access_token(access)
			.authorization_code("sausages")
			.issued_at(issued)
			.expires_at(issued + expires_in)
			.build()
			.expect("Token record fixture should build successfully.")
	}

	/// Coordinator with an empty snapshot whose API points at an unroutable address.
	pub fn idle_coordinator() -> Arc<VehiclesCoordinator> {
		let base = Url::parse("http://127.0.0.1:9/v1/").expect("Fixture base URL should parse.");
		let endpoints = ApiEndpoints::with_base(&base).expect("Fixture endpoints should build.");
		let api = BouncieApi::new(
			ReqwestClient::new(),
			endpoints,
			Arc::new(StaticToken(TokenSecret::new("token"))),
		);

		Arc::new(VehiclesCoordinator::new("bouncie", api, DEFAULT_UPDATE_INTERVAL))
	}

	/// Vehicle payload as served by `GET /v1/vehicles`.
	pub fn sample_vehicle() -> serde_json::Value {
		serde_json::json!({
			"model": { "make": "SPAM", "name": "Eggs", "year": 2020 },
			"nickName": "SPAM Eggs",
			"vin": TEST_VIN,
			"imei": "000000000000000",
			"stats": {
				"localTimeZone": "-0500",
				"lastUpdated": "2022-01-01T12:00:00.000Z",
				"odometer": 123456.789,
				"location": { "lat": 1.2345, "lon": 6.789 },
				"fuelLevel": 98.76,
				"speed": 12.34
			}
		})
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, HashSet, hash_map::DefaultHasher},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::{Hash, Hasher},
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
use color_eyre as _;
#[cfg(test)] use {bouncie_bridge as _, httpmock as _, tower as _};
