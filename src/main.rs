//! `bouncie-bridge` service entry point.

// std
use std::sync::Arc;
// crates.io
use clap::Parser;
use color_eyre::eyre::Result;
use tokio::{
	net::TcpListener,
	sync::broadcast::{self, error::RecvError},
};
// self
use bouncie_bridge::{
	config::{Cli, Settings},
	config_flow::{self, FlowProgress, FlowResult},
	http::ReqwestHttpClient,
	integration::Integration,
	obs, server,
	store::{EntryStore, FileStore, MemoryStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let cli = Cli::parse();

	obs::init_tracing();

	let settings = Settings::resolve(&cli)?;
	let store: Arc<dyn EntryStore> = match &settings.store_path {
		Some(path) => Arc::new(FileStore::open(path)?),
		None => Arc::new(MemoryStore::default()),
	};
	let listen = settings.listen;
	let integration = Arc::new(Integration::new(settings, store, ReqwestHttpClient::new()?)?);

	integration.log_banner();

	let requests = integration.subscribe_reauth();
	let reauth = tokio::spawn(confirm_reauth(integration.clone(), requests));

	for entry in integration.entries().await? {
		match integration.setup_entry(&entry.entry_id).await {
			Ok(outcome) => tracing::info!(entry = %entry.entry_id, ?outcome, "Entry set up."),
			Err(e) => tracing::error!(entry = %entry.entry_id, error = %e, "Entry setup failed."),
		}
	}

	authorize_configured(&integration).await?;

	let listener = TcpListener::bind(listen).await?;

	tracing::info!(%listen, "Listening.");

	axum::serve(listener, server::router(integration.clone()))
		.with_graceful_shutdown(async {
			if let Err(e) = tokio::signal::ctrl_c().await {
				tracing::error!(error = %e, "Failed to listen for the shutdown signal.");
			}
		})
		.await?;

	reauth.abort();
	integration.shutdown().await;

	Ok(())
}

// Starts a user flow for every configured application without an entry.
async fn authorize_configured(integration: &Integration) -> Result<()> {
	for settings in &integration.settings().entries {
		let credentials = settings.credentials()?;
		let unique_id = config_flow::unique_id_for(&credentials.client_id);

		if integration.entry_by_unique_id(&unique_id).await?.is_some() {
			continue;
		}

		log_next_step(&unique_id, integration.step_user(Some(credentials)).await?);
	}

	Ok(())
}

// Setup opens reauthentication flows at any time; confirm each one right away since nobody is
// at a prompt, and log the authorize URL.
async fn confirm_reauth(
	integration: Arc<Integration>,
	mut requests: broadcast::Receiver<FlowProgress>,
) {
	loop {
		let FlowProgress { flow_id, unique_id, .. } = match requests.recv().await {
			Ok(flow) => flow,
			Err(RecvError::Lagged(skipped)) => {
				tracing::warn!(skipped, "Missed reauthentication requests.");

				continue;
			},
			Err(RecvError::Closed) => return,
		};

		match integration.step_reauth_confirm(&flow_id, true).await {
			Ok(result) => log_next_step(&unique_id, result),
			Err(e) => tracing::error!(unique_id, error = %e, "Reauthentication could not start."),
		}
	}
}

fn log_next_step(unique_id: &str, result: FlowResult) {
	match result {
		FlowResult::External { url, .. } => {
			tracing::warn!(unique_id, %url, "Authorization required. Open the URL to continue.");
		},
		FlowResult::Abort { reason } => {
			tracing::warn!(unique_id, %reason, "Authorization flow aborted.");
		},
		other => tracing::debug!(unique_id, ?other, "Authorization flow pending."),
	}
}
