//! OAuth session orchestration for one Bouncie application.

pub mod authorize;
pub mod common;
pub mod refresh;

pub use authorize::*;
pub use common::*;
pub use refresh::*;

// self
use crate::{
	_prelude::*,
	auth::EntryId,
	entry::Credentials,
	http::{ReqwestHttpClient, TokenHttpClient},
	oauth::{BasicFacade, ReqwestTransportErrorMapper, TransportErrorMapper},
	provider::{ProviderDescriptor, ProviderStrategy},
	store::EntryStore,
};

/// Session specialized for the crate's default reqwest transport stack.
pub type ReqwestAuthSession = AuthSession<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// OAuth implementation bound to one set of application credentials.
///
/// The session owns the transport, entry store, descriptor, and strategy so the authorization
/// and refresh flows only deal with grant-specific logic. Every entry created with the same
/// client identifier shares one session.
#[derive(Clone)]
pub struct AuthSession<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every token request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Store holding the entries whose tokens this session refreshes.
	pub store: Arc<dyn EntryStore>,
	/// Provider descriptor that defines OAuth endpoints and quirks.
	pub descriptor: ProviderDescriptor,
	/// Strategy responsible for provider-specific error classification.
	pub strategy: Arc<dyn ProviderStrategy>,
	/// Application credentials.
	pub credentials: Credentials,
	/// Redirect URI registered with the application; code-replay refreshes resend it.
	pub redirect_uri: Option<Url>,
	/// Shared metrics recorder for refresh flow outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	flow_guards: Arc<Mutex<HashMap<EntryId, Arc<AsyncMutex<()>>>>>,
}
impl<C, M> AuthSession<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a session that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		store: Arc<dyn EntryStore>,
		descriptor: ProviderDescriptor,
		strategy: Arc<dyn ProviderStrategy>,
		credentials: Credentials,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			store,
			descriptor,
			strategy,
			credentials,
			redirect_uri: None,
			refresh_metrics: Default::default(),
			flow_guards: Default::default(),
		}
	}

	/// Sets the redirect URI used by authorization and code-replay refreshes.
	pub fn with_redirect_uri(mut self, redirect_uri: Url) -> Self {
		self.redirect_uri = Some(redirect_uri);

		self
	}

	pub(crate) fn facade(&self) -> Result<BasicFacade<C, M>> {
		BasicFacade::from_descriptor(
			&self.descriptor,
			&self.credentials.client_id,
			self.credentials.client_secret.expose(),
			self.http_client.clone(),
			self.transport_mapper.clone(),
		)
	}
}
impl ReqwestAuthSession {
	/// Creates a session backed by the provided reqwest transport.
	pub fn new(
		store: Arc<dyn EntryStore>,
		descriptor: ProviderDescriptor,
		strategy: Arc<dyn ProviderStrategy>,
		credentials: Credentials,
		http_client: ReqwestHttpClient,
	) -> Self {
		Self::with_http_client(
			store,
			descriptor,
			strategy,
			credentials,
			http_client,
			Arc::new(ReqwestTransportErrorMapper),
		)
	}
}
impl<C, M> Debug for AuthSession<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthSession")
			.field("descriptor", &self.descriptor.id)
			.field("client_id", &self.credentials.client_id)
			.field("redirect_uri", &self.redirect_uri)
			.finish()
	}
}
