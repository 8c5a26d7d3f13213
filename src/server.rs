//! HTTP surface of the bridge: the webhook intake plus the OAuth redirect handler.

// crates.io
use axum::{
	Router,
	extract::{Query, State},
	http::StatusCode,
	routing::get,
};
// self
use crate::{
	_prelude::*,
	config::AUTH_CALLBACK_PATH,
	config_flow::FlowResult,
	integration::{Integration, SetupOutcome},
	webhook,
};

/// Query string Bouncie appends to the redirect URI.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CallbackQuery {
	/// Authorization code.
	pub code: Option<String>,
	/// Opaque state issued with the authorize URL.
	pub state: Option<String>,
	/// Error code when the user denied consent.
	pub error: Option<String>,
}

/// Router serving [`webhook::WEBHOOK_PATH`] and [`AUTH_CALLBACK_PATH`].
pub fn router(integration: Arc<Integration>) -> Router {
	let oauth =
		Router::new().route(AUTH_CALLBACK_PATH, get(callback)).with_state(integration.clone());

	webhook::router(integration.webhook_state()).merge(oauth)
}

async fn callback(
	State(integration): State<Arc<Integration>>,
	Query(query): Query<CallbackQuery>,
) -> (StatusCode, String) {
	if let Some(error) = query.error {
		let abandoned =
			query.state.is_some_and(|state| integration.decline_authorization(&state));

		tracing::warn!(error = %error, abandoned, "Authorization was declined.");

		return (StatusCode::BAD_REQUEST, format!("Authorization failed: {error}."));
	}

	let (Some(state), Some(code)) = (query.state, query.code) else {
		return (StatusCode::BAD_REQUEST, "Missing `code` or `state` parameter.".into());
	};

	match integration.step_callback(&state, &code).await {
		Ok(result) => (StatusCode::OK, describe(&result)),
		Err(e) => {
			tracing::warn!(error = %e, "OAuth callback failed.");

			(StatusCode::BAD_REQUEST, format!("Authorization failed: {e}"))
		},
	}
}

fn describe(result: &FlowResult) -> String {
	match result {
		FlowResult::CreateEntry { entry_id, title, outcome: SetupOutcome::Loaded } =>
			format!("Created entry `{title}` ({entry_id}). You can close this window."),
		FlowResult::CreateEntry { entry_id, title, outcome } =>
			format!("Created entry `{title}` ({entry_id}); setup finished as {outcome:?}."),
		FlowResult::Abort { reason } => format!("Flow finished: {reason}."),
		FlowResult::Form { step_id, .. } => format!("Flow waits for step `{step_id}`."),
		FlowResult::External { url, .. } => format!("Continue at {url}."),
	}
}
