//! `POST /api/bouncie`: webhook intake for registered applications.
//!
//! Bouncie sends the application client id as the `Authorization` header. Deliveries from
//! unknown clients and bodies that fail validation are logged and dropped; the endpoint answers
//! `200 OK` regardless so the sender never retries.

// crates.io
use axum::{
	Router,
	body::Bytes,
	extract::State,
	http::{HeaderMap, StatusCode, header::AUTHORIZATION},
	routing::post,
};
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	bus::{BouncieEvent, EventBus},
	model::{SchemaError, WebhookPayload},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	registry::ImplementationRegistry,
};

/// Route served by [`router`].
pub const WEBHOOK_PATH: &str = "/api/bouncie";

/// Shared state of the webhook endpoint.
#[derive(Clone, Debug)]
pub struct WebhookState {
	/// Registered implementations; their client ids authorize deliveries.
	pub registry: ImplementationRegistry,
	/// Bus receiving accepted deliveries.
	pub bus: EventBus,
}

/// Why a delivery from a registered client was dropped.
#[derive(Debug, ThisError)]
pub enum PayloadError {
	/// Body is not JSON.
	#[error("Webhook body is not valid JSON.")]
	Json(#[from] serde_json::Error),
	/// Body does not match the webhook schema.
	#[error(transparent)]
	Schema(#[from] SchemaError),
}

/// Router exposing [`WEBHOOK_PATH`].
pub fn router(state: WebhookState) -> Router {
	Router::new().route(WEBHOOK_PATH, post(receive)).with_state(state)
}

/// Validates a decoded webhook body.
pub fn validate_payload(value: Value) -> Result<WebhookPayload, SchemaError> {
	WebhookPayload::from_value(value)
}

/// Decodes and validates a raw webhook body.
pub fn parse_body(body: &[u8]) -> Result<WebhookPayload, PayloadError> {
	Ok(validate_payload(serde_json::from_slice(body)?)?)
}

async fn receive(
	State(state): State<WebhookState>,
	headers: HeaderMap,
	body: Bytes,
) -> StatusCode {
	let _span = FlowSpan::new(FlowKind::Webhook, "receive").entered();

	deliver(&state, &headers, &body);

	StatusCode::OK
}

fn deliver(state: &WebhookState, headers: &HeaderMap, body: &[u8]) {
	obs::record_flow_outcome(FlowKind::Webhook, FlowOutcome::Attempt);

	let client_id = headers
		.get(AUTHORIZATION)
		.and_then(|value| value.to_str().ok())
		.and_then(|candidate| state.registry.authorize(candidate));
	let Some(client_id) = client_id else {
		obs::record_flow_outcome(FlowKind::Webhook, FlowOutcome::Failure);

		tracing::warn!(body = %String::from_utf8_lossy(body), "Received unauthorized request.");

		return;
	};

	match parse_body(body) {
		Ok(payload) => {
			obs::record_flow_outcome(FlowKind::Webhook, FlowOutcome::Success);

			state.bus.publish(BouncieEvent { client_id, payload });
		},
		Err(e) => {
			obs::record_flow_outcome(FlowKind::Webhook, FlowOutcome::Failure);

			tracing::warn!(
				body = %String::from_utf8_lossy(body),
				error = %e,
				"Received authorized event but unable to parse."
			);
		},
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	#[test]
	fn body_parsing_distinguishes_json_and_schema_errors() {
		assert!(matches!(parse_body(b"not json"), Err(PayloadError::Json(_))));
		assert!(matches!(
			parse_body(br#"{"eventType":"connect","imei":"1"}"#),
			Err(PayloadError::Schema(SchemaError::MissingField("vin")))
		));
		assert!(parse_body(br#"{"eventType":"connect","imei":1,"vin":"V"}"#).is_ok());
	}

	#[test]
	fn validate_payload_coerces_booleans() {
		let payload = validate_payload(json!({ "eventType": "mil", "imei": true, "vin": "V" }))
			.expect("Payload should validate.");

		assert_eq!(payload.imei, "true");
	}
}
