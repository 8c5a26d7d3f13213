//! OAuth client facade over the `oauth2` crate.

pub use oauth2;

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, ClientId as OAuthClientId, ClientSecret, CsrfToken,
	EndpointNotSet, EndpointSet, HttpClientError, RedirectUrl, RefreshToken, RequestTokenError,
	TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::{EntryId, TokenRecord},
	error::{ConfigError, TransientError, TransportError},
	http::{ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	provider::{
		ClientAuthMethod, GrantType, ProviderDescriptor, ProviderErrorContext, ProviderErrorKind,
		ProviderStrategy,
	},
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Maps HTTP transport failures into bridge [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a bridge error.
	fn map_transport_error(
		&self,
		strategy: &dyn ProviderStrategy,
		grant: GrantType,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		_strategy: &dyn ProviderStrategy,
		_grant: GrantType,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => transient(
				meta,
				format!("HTTP client error occurred while calling the token endpoint: {message}"),
			),
			_ => transient(meta, "HTTP client error occurred while calling the token endpoint"),
		}
	}
}

pub(crate) trait OAuth2Facade {
	fn authorize_url(&self, state: &str, redirect_uri: &Url) -> Result<Url>;

	fn exchange_authorization_code<'a, 'strategy, 'code, 'redirect>(
		&'a self,
		strategy: &'strategy dyn ProviderStrategy,
		entry: EntryId,
		code: &'code str,
		redirect_uri: &'redirect Url,
	) -> FacadeFuture<'a, TokenRecord>
	where
		'strategy: 'a,
		'code: 'a,
		'redirect: 'a;

	fn refresh_token<'a, 'strategy, 'refresh>(
		&'a self,
		strategy: &'strategy dyn ProviderStrategy,
		entry: EntryId,
		refresh_token: &'refresh str,
	) -> FacadeFuture<'a, TokenRecord>
	where
		'strategy: 'a,
		'refresh: 'a;
}

pub(crate) struct BasicFacade<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredBasicClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn from_descriptor(
		descriptor: &ProviderDescriptor,
		client_id: &str,
		client_secret: &str,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let auth_url = AuthUrl::new(descriptor.endpoints.authorization.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let token_url = TokenUrl::new(descriptor.endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let mut oauth_client = BasicClient::new(OAuthClientId::new(client_id.to_owned()))
			.set_client_secret(ClientSecret::new(client_secret.to_owned()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url);

		if matches!(descriptor.preferred_client_auth_method, ClientAuthMethod::ClientSecretPost) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self {
			oauth_client,
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
		})
	}
}
impl<C, M> OAuth2Facade for BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn authorize_url(&self, state: &str, redirect_uri: &Url) -> Result<Url> {
		let redirect_url = RedirectUrl::new(redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidRedirect { source })?;
		let state = state.to_owned();
		let (url, _) = self
			.oauth_client
			.authorize_url(move || CsrfToken::new(state))
			.set_redirect_uri(Cow::Owned(redirect_url))
			.url();

		Ok(url)
	}

	fn exchange_authorization_code<'a, 'strategy, 'code, 'redirect>(
		&'a self,
		strategy: &'strategy dyn ProviderStrategy,
		entry: EntryId,
		code: &'code str,
		redirect_uri: &'redirect Url,
	) -> FacadeFuture<'a, TokenRecord>
	where
		'strategy: 'a,
		'code: 'a,
		'redirect: 'a,
	{
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let redirect_url = RedirectUrl::new(redirect_uri.to_string())
				.map_err(|source| ConfigError::InvalidRedirect { source })?;
			let response = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.set_redirect_uri(Cow::Owned(redirect_url))
				.request_async(&instrumented)
				.await
				.map_err(|err| {
					map_request_error(
						strategy,
						GrantType::AuthorizationCode,
						meta.take(),
						err,
						self.error_mapper.as_ref(),
					)
				})?;
			let mut record = map_token_response(entry, response)?;

			record.authorization_code = Some(crate::auth::TokenSecret::new(code));

			Ok(record)
		})
	}

	fn refresh_token<'a, 'strategy, 'refresh>(
		&'a self,
		strategy: &'strategy dyn ProviderStrategy,
		entry: EntryId,
		refresh_token: &'refresh str,
	) -> FacadeFuture<'a, TokenRecord>
	where
		'strategy: 'a,
		'refresh: 'a,
	{
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let refresh_secret = RefreshToken::new(refresh_token.to_owned());
			let response = self
				.oauth_client
				.exchange_refresh_token(&refresh_secret)
				.request_async(&instrumented)
				.await
				.map_err(|err| {
					map_request_error(
						strategy,
						GrantType::RefreshToken,
						meta.take(),
						err,
						self.error_mapper.as_ref(),
					)
				})?;

			map_token_response(entry, response)
		})
	}
}

fn map_token_response(entry: EntryId, response: BasicTokenResponse) -> Result<TokenRecord> {
	let expires_in = response.expires_in().ok_or(ConfigError::MissingExpiresIn)?.as_secs();
	let expires_in = i64::try_from(expires_in).map_err(|_| ConfigError::ExpiresInOutOfRange)?;

	if expires_in <= 0 {
		return Err(ConfigError::NonPositiveExpiresIn.into());
	}

	let mut builder = TokenRecord::builder(entry)
		.access_token(response.access_token().secret().to_owned())
		.token_type(response.token_type().as_ref())
		.issued_now()
		.expires_in(Duration::seconds(expires_in));

	if let Some(refresh) = response.refresh_token() {
		builder = builder.refresh_token(refresh.secret().to_owned());
	}

	builder.build().map_err(|e| ConfigError::from(e).into())
}

fn map_request_error<E, M>(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(strategy, grant, response, meta_ref),
		RequestTokenError::Request(error) =>
			mapper.map_transport_error(strategy, grant, meta_ref, error),
		RequestTokenError::Parse(source, _body) => TransientError::ResponseParse {
			endpoint: "Token endpoint",
			source,
			status: meta_status(meta_ref),
		}
		.into(),
		RequestTokenError::Other(message) => transient(meta_ref, message),
	}
}

fn map_server_response_error(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let mut ctx =
		ProviderErrorContext::new(grant).with_oauth_error(response.error().as_ref().to_string());

	if let Some(description) = response.error_description() {
		ctx = ctx.with_error_description(description.clone());
	}
	if let Some(status) = meta_status(meta) {
		ctx = ctx.with_http_status(status);
	}

	let message = match response.error_description() {
		Some(description) => format!("token endpoint returned an OAuth error: {description}"),
		None => format!("token endpoint returned an OAuth error: {}", response.error().as_ref()),
	};

	match strategy.classify_token_error(&ctx) {
		ProviderErrorKind::InvalidGrant => Error::InvalidGrant { reason: message },
		ProviderErrorKind::InvalidClient => Error::InvalidClient { reason: message },
		ProviderErrorKind::Transient => transient(meta, message),
	}
}

fn map_reqwest_error(meta: Option<&ResponseMetadata>, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::TokenEndpoint {
			message: "request timed out while calling the token endpoint".into(),
			status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
			retry_after: meta_retry_after(meta),
		}
		.into();
	}

	TransportError::from(err).into()
}

fn transient(meta: Option<&ResponseMetadata>, message: impl Into<String>) -> Error {
	TransientError::TokenEndpoint {
		message: message.into(),
		status: meta_status(meta),
		retry_after: meta_retry_after(meta),
	}
	.into()
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}
