//! Integration context: everything one bridge instance shares across its config entries.
//!
//! [`Integration`] owns the entry store, the HTTP client, the event bus, the implementation
//! registry, pending config flows, and one runtime (coordinator, entities, background tasks)
//! per loaded entry.

// crates.io
use tokio::{
	sync::{broadcast, watch},
	task::JoinHandle,
};
// self
use crate::{
	_prelude::*,
	api::{BouncieApi, EntryTokenSource},
	auth::EntryId,
	bus::EventBus,
	config::Settings,
	config_flow::{ConfigFlows, FlowProgress},
	coordinator::VehiclesCoordinator,
	entity::EntitySet,
	entry::{ConfigEntry, Credentials},
	error::ConfigError,
	flows::ReqwestAuthSession,
	http::ReqwestHttpClient,
	obs::{self, FlowKind},
	provider::{DefaultProviderStrategy, ProviderDescriptor, ProviderStrategy},
	registry::ImplementationRegistry,
	store::EntryStore,
	webhook::WebhookState,
};

/// Integration name shown in the startup banner.
pub const NAME: &str = "Bouncie";
/// Integration version shown in the startup banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Where problems should be reported.
pub const ISSUE_URL: &str = "https://github.com/niro1987/ha-bouncie/issues";

const REAUTH_CHANNEL_CAPACITY: usize = 16;

/// Result of [`Integration::setup_entry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupOutcome {
	/// Entities were created and polling started.
	Loaded,
	/// The stored authorization was rejected; a reauthentication flow is pending.
	ReauthRequired,
	/// Setup aborted for any other reason; nothing was started.
	Failed,
}

/// Per-entry state of a loaded config entry.
#[derive(Debug)]
pub struct EntryRuntime {
	/// Vehicle coordinator.
	pub coordinator: Arc<VehiclesCoordinator>,
	/// Entities created at setup.
	pub entities: EntitySet,
	shutdown: watch::Sender<bool>,
	tasks: Vec<JoinHandle<()>>,
}
impl EntryRuntime {
	async fn stop(self) {
		self.shutdown.send_replace(true);

		for task in self.tasks {
			if let Err(e) = task.await {
				tracing::warn!(error = %e, "Entry task ended abnormally.");
			}
		}
	}
}

/// Shared context of one bridge instance.
pub struct Integration {
	settings: Settings,
	store: Arc<dyn EntryStore>,
	http: ReqwestHttpClient,
	descriptor: ProviderDescriptor,
	strategy: Arc<dyn ProviderStrategy>,
	bus: EventBus,
	registry: ImplementationRegistry,
	runtimes: Mutex<HashMap<EntryId, Arc<EntryRuntime>>>,
	pub(crate) flows: ConfigFlows,
	pub(crate) reauth_requests: broadcast::Sender<FlowProgress>,
}
impl Integration {
	/// Creates a context for the production Bouncie cloud.
	pub fn new(
		settings: Settings,
		store: Arc<dyn EntryStore>,
		http: ReqwestHttpClient,
	) -> Result<Self> {
		Ok(Self::with_descriptor(settings, store, http, ProviderDescriptor::bouncie()?))
	}

	/// Creates a context for a custom OAuth provider.
	pub fn with_descriptor(
		settings: Settings,
		store: Arc<dyn EntryStore>,
		http: ReqwestHttpClient,
		descriptor: ProviderDescriptor,
	) -> Self {
		Self {
			settings,
			store,
			http,
			descriptor,
			strategy: Arc::new(DefaultProviderStrategy),
			bus: EventBus::new(),
			registry: ImplementationRegistry::default(),
			runtimes: Default::default(),
			flows: Default::default(),
			reauth_requests: broadcast::channel(REAUTH_CHANNEL_CAPACITY).0,
		}
	}

	/// Logs the startup banner.
	pub fn log_banner(&self) {
		tracing::info!("{NAME} {VERSION} starting. Report issues at {ISSUE_URL}.");
	}

	/// Service settings.
	pub fn settings(&self) -> &Settings {
		&self.settings
	}

	/// Entry store.
	pub fn store(&self) -> &Arc<dyn EntryStore> {
		&self.store
	}

	/// Event bus carrying webhook deliveries.
	pub fn bus(&self) -> &EventBus {
		&self.bus
	}

	/// Reauthentication flows as they are opened.
	///
	/// A deployment without an interactive prompt subscribes here and answers each flow with
	/// [`Integration::step_reauth_confirm`].
	pub fn subscribe_reauth(&self) -> broadcast::Receiver<FlowProgress> {
		self.reauth_requests.subscribe()
	}

	/// Registered OAuth implementations.
	pub fn registry(&self) -> &ImplementationRegistry {
		&self.registry
	}

	/// State for [`crate::webhook::router`].
	pub fn webhook_state(&self) -> WebhookState {
		WebhookState { registry: self.registry.clone(), bus: self.bus.clone() }
	}

	/// OAuth redirect URI; fails when no external URL is configured.
	pub fn ensure_external_url(&self) -> Result<Url, ConfigError> {
		self.settings.redirect_uri().inspect_err(|e| {
			if matches!(e, ConfigError::NoExternalUrl) {
				tracing::error!(
					"An external URL is required to set up Bouncie. Set `external_url` in the \
					 configuration file or pass `--external-url`."
				);
			}
		})
	}

	/// Returns the implementation registered for `credentials`, registering a new one when
	/// none exists or the secrets changed.
	pub fn implementation(&self, credentials: Credentials) -> Result<Arc<ReqwestAuthSession>> {
		if let Some(existing) = self.registry.get(&credentials.client_id) {
			if existing.credentials == credentials {
				return Ok(existing);
			}
		}

		let session = ReqwestAuthSession::new(
			self.store.clone(),
			self.descriptor.clone(),
			self.strategy.clone(),
			credentials,
			self.http.clone(),
		)
		.with_redirect_uri(self.ensure_external_url()?);

		Ok(self.registry.register(Arc::new(session)))
	}

	/// Every stored entry.
	pub async fn entries(&self) -> Result<Vec<ConfigEntry>> {
		Ok(self.store.list().await?)
	}

	/// Stored entry with `unique_id`.
	pub async fn entry_by_unique_id(&self, unique_id: &str) -> Result<Option<ConfigEntry>> {
		Ok(self.entries().await?.into_iter().find(|entry| entry.unique_id == unique_id))
	}

	/// Whether `entry_id` is loaded.
	pub fn is_loaded(&self, entry_id: &EntryId) -> bool {
		self.runtimes.lock().contains_key(entry_id)
	}

	/// Runtime of a loaded entry.
	pub fn runtime(&self, entry_id: &EntryId) -> Option<Arc<EntryRuntime>> {
		self.runtimes.lock().get(entry_id).cloned()
	}

	/// Sets up a stored entry: registers its implementation, polls once, verifies the
	/// authorization against `GET /user`, then creates entities and starts background tasks.
	pub async fn setup_entry(&self, entry_id: &EntryId) -> Result<SetupOutcome> {
		obs::observe(FlowKind::Setup, "setup_entry", async {
			if self.is_loaded(entry_id) {
				tracing::debug!(entry = %entry_id, "Entry is already loaded.");

				return Ok(SetupOutcome::Loaded);
			}

			let entry = self
				.store
				.fetch(entry_id)
				.await?
				.ok_or_else(|| Error::UnknownEntry(entry_id.to_string()))?;

			self.ensure_external_url()?;

			let session = self.implementation(entry.credentials.clone())?;
			let tokens = Arc::new(EntryTokenSource::new(session, entry_id.clone()));
			let api = BouncieApi::new(self.http.0.clone(), self.settings.api_endpoints()?, tokens)
				.with_scheme(self.settings.api.authorization_scheme);
			let coordinator = Arc::new(VehiclesCoordinator::new(
				entry.title.clone(),
				api,
				self.settings.poll_interval(),
			));

			// A failed first poll still lets the user check below decide the outcome.
			let _ = coordinator.refresh().await;

			match coordinator.api().get_user().await {
				Ok(user) => {
					tracing::debug!(entry = %entry_id, user = ?user.id, "Authorization verified.");
				},
				Err(e) if e.requires_reauth() => {
					tracing::warn!(entry = %entry_id, error = %e, "Authorization rejected.");

					self.start_reauth(&entry);

					return Ok(SetupOutcome::ReauthRequired);
				},
				Err(e) => {
					tracing::warn!(entry = %entry_id, error = %e, "Setup failed.");

					return Ok(SetupOutcome::Failed);
				},
			}

			let entities = EntitySet::build(&coordinator);
			let (shutdown, shutdown_rx) = watch::channel(false);
			let poller = {
				let coordinator = coordinator.clone();
				let shutdown_rx = shutdown_rx.clone();

				tokio::spawn(async move { coordinator.run(shutdown_rx).await })
			};
			let pump = tokio::spawn(entities.clone().pump(
				coordinator.subscribe(),
				self.bus.subscribe(),
				shutdown_rx,
			));

			tracing::info!(
				entry = %entry_id,
				vehicles = coordinator.data().len(),
				entities = entities.len(),
				"Entry loaded."
			);

			self.runtimes.lock().insert(
				entry_id.clone(),
				Arc::new(EntryRuntime {
					coordinator,
					entities,
					shutdown,
					tasks: vec![poller, pump],
				}),
			);

			Ok(SetupOutcome::Loaded)
		})
		.await
	}

	/// Stops an entry's background tasks and drops its runtime; returns whether it was loaded.
	pub async fn unload_entry(&self, entry_id: &EntryId) -> bool {
		let Some(runtime) = self.runtimes.lock().remove(entry_id) else {
			return false;
		};

		match Arc::try_unwrap(runtime) {
			Ok(runtime) => runtime.stop().await,
			// Still shared by a caller; signal the tasks and let the last holder drop them.
			Err(shared) => {
				shared.shutdown.send_replace(true);
			},
		}

		tracing::info!(entry = %entry_id, "Entry unloaded.");

		true
	}

	/// Unloads and sets up an entry again.
	pub async fn reload(&self, entry_id: &EntryId) -> Result<SetupOutcome> {
		self.unload_entry(entry_id).await;
		self.setup_entry(entry_id).await
	}

	/// Unloads and deletes an entry; its implementation is dropped once no entry uses it.
	pub async fn remove_entry(&self, entry_id: &EntryId) -> Result<Option<ConfigEntry>> {
		self.unload_entry(entry_id).await;

		let Some(removed) = self.store.remove(entry_id).await? else {
			return Ok(None);
		};
		let still_used = self
			.entries()
			.await?
			.iter()
			.any(|entry| entry.auth_implementation == removed.auth_implementation);

		if !still_used {
			self.registry.remove(&removed.auth_implementation);
		}

		Ok(Some(removed))
	}

	/// Unloads every entry.
	pub async fn shutdown(&self) {
		let loaded = self.runtimes.lock().keys().cloned().collect::<Vec<_>>();

		for entry_id in loaded {
			self.unload_entry(&entry_id).await;
		}
	}
}
impl Debug for Integration {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Integration")
			.field("external_url", &self.settings.external_url)
			.field("descriptor", &self.descriptor.id)
			.field("implementations", &self.registry.client_ids())
			.finish()
	}
}
