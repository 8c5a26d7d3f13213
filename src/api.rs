//! Bouncie REST client bound to an OAuth session.

// crates.io
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{EntryId, TokenSecret},
	error::{ConfigError, TransientError, TransportError},
	flows::{AuthSession, TokenRequest},
	http::TokenHttpClient,
	model::{User, Vehicle},
	oauth::TransportErrorMapper,
};

/// Production REST base.
pub const BOUNCIE_API_BASE: &str = "https://api.bouncie.dev/v1/";

/// Boxed future yielding an access token.
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<TokenSecret>> + 'a + Send>>;

/// Supplies a valid access token before each API call.
pub trait TokenSource
where
	Self: Send + Sync,
{
	/// Returns an access token that is valid for at least the next request.
	fn access_token(&self) -> TokenFuture<'_>;
}

/// Fixed token, for tools and tests that manage tokens themselves.
#[derive(Clone, Debug)]
pub struct StaticToken(pub TokenSecret);
impl TokenSource for StaticToken {
	fn access_token(&self) -> TokenFuture<'_> {
		let token = self.0.clone();

		Box::pin(async move { Ok(token) })
	}
}

/// Token source that keeps a config entry's token valid through its [`AuthSession`].
pub struct EntryTokenSource<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	session: Arc<AuthSession<C, M>>,
	entry: EntryId,
}
impl<C, M> EntryTokenSource<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Binds `entry` to `session`.
	pub fn new(session: Arc<AuthSession<C, M>>, entry: EntryId) -> Self {
		Self { session, entry }
	}
}
impl<C, M> TokenSource for EntryTokenSource<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn access_token(&self) -> TokenFuture<'_> {
		Box::pin(async move {
			let request = TokenRequest::new(self.entry.clone());
			let record = self.session.ensure_token_valid(request).await?;

			Ok(record.access_token)
		})
	}
}

/// How the access token is presented in the `Authorization` header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationScheme {
	/// `Authorization: Bearer <token>`.
	#[default]
	Bearer,
	/// `Authorization: <token>`, as documented by Bouncie.
	Raw,
}
impl AuthorizationScheme {
	fn header_value(self, token: &TokenSecret) -> Result<HeaderValue> {
		let raw = match self {
			Self::Bearer => format!("Bearer {}", token.expose()),
			Self::Raw => token.expose().to_owned(),
		};
		let mut value = HeaderValue::from_str(&raw).map_err(|_| ConfigError::InvalidField {
			field: "access_token",
			reason: "token contains characters not allowed in a header".into(),
		})?;

		value.set_sensitive(true);

		Ok(value)
	}
}

/// User and vehicle endpoint URLs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiEndpoints {
	/// `GET` endpoint returning the authenticated user.
	pub user: Url,
	/// `GET` endpoint returning every vehicle of the user.
	pub vehicles: Url,
}
impl ApiEndpoints {
	/// Endpoints below `base`, which must end with a slash.
	pub fn with_base(base: &Url) -> Result<Self> {
		let join = |path: &str| -> Result<Url> {
			base.join(path).map_err(|source| ConfigError::InvalidDescriptor { source }.into())
		};

		Ok(Self { user: join("user")?, vehicles: join("vehicles")? })
	}

	/// Production endpoints.
	pub fn bouncie() -> Result<Self> {
		let base = Url::parse(BOUNCIE_API_BASE)
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;

		Self::with_base(&base)
	}
}

/// REST client for the Bouncie API.
#[derive(Clone)]
pub struct BouncieApi {
	http: ReqwestClient,
	endpoints: ApiEndpoints,
	tokens: Arc<dyn TokenSource>,
	scheme: AuthorizationScheme,
}
impl BouncieApi {
	/// Creates a client that authenticates with tokens from `tokens`.
	pub fn new(
		http: ReqwestClient,
		endpoints: ApiEndpoints,
		tokens: Arc<dyn TokenSource>,
	) -> Self {
		Self { http, endpoints, tokens, scheme: AuthorizationScheme::default() }
	}

	/// Overrides the `Authorization` header scheme.
	pub fn with_scheme(mut self, scheme: AuthorizationScheme) -> Self {
		self.scheme = scheme;

		self
	}

	/// Fetches the authenticated user.
	pub async fn get_user(&self) -> Result<User> {
		self.get_json("user", &self.endpoints.user).await
	}

	/// Fetches every vehicle of the authenticated user.
	///
	/// Records that fail to decode are skipped so one malformed vehicle cannot hide the rest.
	pub async fn get_vehicles(&self) -> Result<Vec<Vehicle>> {
		let records: Vec<serde_json::Value> =
			self.get_json("vehicles", &self.endpoints.vehicles).await?;

		Ok(records
			.into_iter()
			.filter_map(|record| match serde_path_to_error::deserialize(&record) {
				Ok(vehicle) => Some(vehicle),
				Err(e) => {
					tracing::warn!(
						vin = record.get("vin").and_then(serde_json::Value::as_str),
						path = %e.path(),
						error = %e.inner(),
						"Skipping vehicle record that failed to decode."
					);

					None
				},
			})
			.collect())
	}

	async fn get_json<T>(&self, endpoint: &'static str, url: &Url) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let token = self.tokens.access_token().await?;
		let response = self
			.http
			.get(url.clone())
			.header(AUTHORIZATION, self.scheme.header_value(&token)?)
			.send()
			.await
			.map_err(TransportError::from)?;
		let status = response.status();

		if !status.is_success() {
			tracing::debug!(endpoint, status = status.as_u16(), "Bouncie API request failed.");

			return Err(Error::Api { status: status.as_u16(), url: url.to_string() });
		}

		let bytes = response.bytes().await.map_err(TransportError::from)?;
		let mut deserializer = serde_json::Deserializer::from_slice(&bytes);

		serde_path_to_error::deserialize(&mut deserializer).map_err(|source| {
			TransientError::ResponseParse { endpoint, source, status: Some(status.as_u16()) }
				.into()
		})
	}
}
impl Debug for BouncieApi {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BouncieApi")
			.field("endpoints", &self.endpoints)
			.field("scheme", &self.scheme)
			.finish()
	}
}
