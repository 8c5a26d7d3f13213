// crates.io
use httpmock::prelude::*;
// self
use bouncie_bridge::{
	_preludet::*,
	api::{ApiEndpoints, AuthorizationScheme, BouncieApi, StaticToken},
	auth::TokenSecret,
	error::TransientError,
};

fn build_api(server: &MockServer, scheme: AuthorizationScheme) -> BouncieApi {
	let base = Url::parse(&server.url("/v1/")).expect("Mock API base should parse successfully.");
	let endpoints = ApiEndpoints::with_base(&base).expect("Mock endpoints should build.");

	BouncieApi::new(
		ReqwestClient::new(),
		endpoints,
		Arc::new(StaticToken(TokenSecret::new("access-api"))),
	)
	.with_scheme(scheme)
}

#[tokio::test]
async fn vehicles_are_fetched_with_a_bearer_header() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/vehicles").header("authorization", "Bearer access-api");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(serde_json::json!([sample_vehicle()]));
		})
		.await;
	let vehicles = build_api(&server, AuthorizationScheme::Bearer)
		.get_vehicles()
		.await
		.expect("Vehicle list should decode.");

	mock.assert_async().await;

	assert_eq!(vehicles.len(), 1);
	assert_eq!(vehicles[0].vin.as_ref(), TEST_VIN);
	assert_eq!(vehicles[0].display_name(), "SPAM Eggs");
	assert_eq!(vehicles[0].stats.odometer, Some(123456.789));
}

#[tokio::test]
async fn malformed_vehicle_records_are_skipped() {
	let server = MockServer::start_async().await;
	let mut bad_vin = sample_vehicle();

	bad_vin["vin"] = serde_json::json!("BAD VIN ");

	server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/vehicles");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(serde_json::json!([bad_vin, sample_vehicle(), { "nickName": 7 }]));
		})
		.await;

	let vehicles = build_api(&server, AuthorizationScheme::Bearer)
		.get_vehicles()
		.await
		.expect("Well-formed vehicles should still decode.");

	assert_eq!(vehicles.len(), 1);
	assert_eq!(vehicles[0].vin.as_ref(), TEST_VIN);
}

#[tokio::test]
async fn raw_scheme_sends_the_bare_token() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/user").header("authorization", "access-api");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"id":"user-1","email":"spam@example.com","name":"Spam"}"#);
		})
		.await;
	let user = build_api(&server, AuthorizationScheme::Raw)
		.get_user()
		.await
		.expect("User should decode.");

	mock.assert_async().await;

	assert_eq!(user.id.as_deref(), Some("user-1"));
	assert_eq!(user.email.as_deref(), Some("spam@example.com"));
}

#[tokio::test]
async fn rejected_tokens_surface_as_api_errors() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/user");
			then.status(401);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/vehicles");
			then.status(503);
		})
		.await;

	let api = build_api(&server, AuthorizationScheme::Bearer);
	let err = api.get_user().await.expect_err("Unauthorized user request should fail.");

	assert!(matches!(err, Error::Api { status: 401, .. }));
	assert!(err.requires_reauth());

	let err = api.get_vehicles().await.expect_err("Unavailable API should fail.");

	assert!(matches!(err, Error::Api { status: 503, .. }));
	assert!(!err.requires_reauth());
}

#[tokio::test]
async fn malformed_bodies_report_the_endpoint() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/vehicles");
			then.status(200).header("content-type", "application/json").body(r#"{"not":"a list"}"#);
		})
		.await;

	let err = build_api(&server, AuthorizationScheme::Bearer)
		.get_vehicles()
		.await
		.expect_err("Object body should not decode as a vehicle list.");

	assert!(matches!(
		err,
		Error::Transient(TransientError::ResponseParse {
			endpoint: "vehicles",
			status: Some(200),
			..
		})
	));
}
