// crates.io
use httpmock::prelude::*;
// self
use bouncie_bridge::{
	_preludet::*,
	auth::{EntryId, TokenSecret},
	error::ConfigError,
};

const REDIRECT_URI: &str = "https://bridge.example.com/auth/external/callback";

fn redirect_uri() -> Url {
	Url::parse(REDIRECT_URI).expect("Redirect URI should parse successfully.")
}

fn entry_id() -> EntryId {
	EntryId::new("entry-authorize").expect("Entry identifier should be valid.")
}

#[tokio::test]
async fn authorize_url_and_code_exchange_follow_bouncie_conventions() {
	let server = MockServer::start_async().await;
	let (session, _store) =
		build_reqwest_test_session(mock_descriptor(&server.base_url()), redirect_uri());
	let authorization = session
		.start_authorization(entry_id(), redirect_uri())
		.expect("Authorization session should start successfully.");
	let params = authorization.authorize_url.query_pairs().into_owned().collect::<HashMap<_, _>>();

	assert_eq!(authorization.authorize_url.path(), "/dialog/authorize");
	assert_eq!(params.get("response_type").map(String::as_str), Some("code"));
	assert_eq!(params.get("client_id").map(String::as_str), Some(TEST_CLIENT_ID));
	assert_eq!(params.get("redirect_uri").map(String::as_str), Some(REDIRECT_URI));
	assert_eq!(params.get("state"), Some(&authorization.state));
	assert_eq!(authorization.state.len(), 32);
	assert!(authorization.validate_state(&authorization.state).is_ok());
	assert!(matches!(
		authorization.validate_state("forged"),
		Err(Error::InvalidGrant { .. })
	));

	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/token")
				.form_urlencoded_tuple("grant_type", "authorization_code")
				.form_urlencoded_tuple("code", "sausages")
				.form_urlencoded_tuple("redirect_uri", REDIRECT_URI)
				.form_urlencoded_tuple("client_id", TEST_CLIENT_ID)
				.form_urlencoded_tuple("client_secret", TEST_CLIENT_SECRET);
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-initial", 3600));
		})
		.await;
	let record = session
		.exchange_code(&authorization, " sausages ")
		.await
		.expect("Code exchange should succeed.");

	mock.assert_async().await;

	assert_eq!(record.entry, entry_id());
	assert_eq!(record.access_token.expose(), "access-initial");
	assert_eq!(record.authorization_code.as_ref().map(TokenSecret::expose), Some("sausages"));
	assert!(record.refresh_token.is_none());
	assert!(record.expires_at > OffsetDateTime::now_utc() + Duration::minutes(59));
}

#[tokio::test]
async fn rejected_codes_surface_as_invalid_grant() {
	let server = MockServer::start_async().await;
	let (session, _store) =
		build_reqwest_test_session(mock_descriptor(&server.base_url()), redirect_uri());
	let authorization = session
		.start_authorization(entry_id(), redirect_uri())
		.expect("Authorization session should start successfully.");
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(400)
				.header("content-type", "application/json")
				.body(r#"{"error":"invalid_grant","error_description":"code already used"}"#);
		})
		.await;
	let err = session
		.exchange_code(&authorization, "stale-code")
		.await
		.expect_err("Rejected code should fail the exchange.");

	mock.assert_async().await;

	assert!(matches!(err, Error::InvalidGrant { .. }));
	assert!(err.requires_reauth());
}

#[tokio::test]
async fn blank_codes_never_reach_the_provider() {
	let server = MockServer::start_async().await;
	let (session, _store) =
		build_reqwest_test_session(mock_descriptor(&server.base_url()), redirect_uri());
	let authorization = session
		.start_authorization(entry_id(), redirect_uri())
		.expect("Authorization session should start successfully.");
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(500);
		})
		.await;
	let err = session
		.exchange_code(&authorization, "   ")
		.await
		.expect_err("Blank code should be rejected locally.");

	assert!(matches!(err, Error::Config(ConfigError::MissingAuthorizationCode)));
	assert_eq!(mock.hits_async().await, 0);
}
