// crates.io
use axum::{
	body::Body,
	http::{Request, StatusCode, header::AUTHORIZATION},
};
use tokio::sync::broadcast::error::TryRecvError;
use tower::ServiceExt;
// self
use bouncie_bridge::{
	_preludet::*,
	bus::{BOUNCIE_EVENT, EventBus},
	registry::ImplementationRegistry,
	webhook::{self, WEBHOOK_PATH, WebhookState},
};

fn state() -> WebhookState {
	let redirect = Url::parse("https://bridge.example.com/auth/external/callback")
		.expect("Redirect URI should parse successfully.");
	let (session, _store) =
		build_reqwest_test_session(mock_descriptor("https://127.0.0.1"), redirect);
	let registry = ImplementationRegistry::default();

	registry.register(Arc::new(session));

	WebhookState { registry, bus: EventBus::new() }
}

fn delivery(authorization: Option<&str>, body: &str) -> Request<Body> {
	let mut request = Request::builder().method("POST").uri(WEBHOOK_PATH);

	if let Some(value) = authorization {
		request = request.header(AUTHORIZATION, value);
	}

	request.body(Body::from(body.to_owned())).expect("Request should build.")
}

const TRIP_DATA: &str = r#"{
	"eventType": "tripData",
	"imei": 123456789012345,
	"vin": "ABCDEFG123456NOP7",
	"transactionId": "trip-1",
	"data": [
		{ "timestamp": "2022-01-01T12:00:00.000Z", "gps": { "lat": 1.5, "lon": 2.5 }, "speed": 42.0 }
	]
}"#;

#[tokio::test]
async fn unauthorized_deliveries_are_acknowledged_and_dropped() {
	let state = state();
	let mut events = state.bus.subscribe();

	for authorization in [None, Some("someone-else")] {
		let response = webhook::router(state.clone())
			.oneshot(delivery(authorization, TRIP_DATA))
			.await
			.expect("Router should answer.");

		assert_eq!(response.status(), StatusCode::OK);
	}

	assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn invalid_bodies_from_registered_clients_are_dropped() {
	let state = state();
	let mut events = state.bus.subscribe();

	for body in ["not json", r#"{"eventType":"connect","imei":"1"}"#, r#"[1, 2, 3]"#] {
		let response = webhook::router(state.clone())
			.oneshot(delivery(Some(TEST_CLIENT_ID), body))
			.await
			.expect("Router should answer.");

		assert_eq!(response.status(), StatusCode::OK);
	}

	assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn valid_deliveries_are_republished_with_the_client_id() {
	let state = state();
	let mut events = state.bus.subscribe();
	let response = webhook::router(state.clone())
		.oneshot(delivery(Some(TEST_CLIENT_ID), TRIP_DATA))
		.await
		.expect("Router should answer.");

	assert_eq!(response.status(), StatusCode::OK);

	let event = events.try_recv().expect("Delivery should be published.");

	assert_eq!(event.event_type(), BOUNCIE_EVENT);
	assert_eq!(event.client_id.as_ref(), TEST_CLIENT_ID);
	assert_eq!(event.payload.imei, "123456789012345");
	assert_eq!(event.payload.trip_data().len(), 1);

	let data = event.data();

	assert_eq!(data["client_id"], TEST_CLIENT_ID);
	assert_eq!(data["eventType"], "tripData");
	assert_eq!(data["transactionId"], "trip-1");
}

#[tokio::test]
async fn only_post_is_routed() {
	let response = webhook::router(state())
		.oneshot(
			Request::builder()
				.uri(WEBHOOK_PATH)
				.body(Body::empty())
				.expect("Request should build."),
		)
		.await
		.expect("Router should answer.");

	assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
