// crates.io
use httpmock::prelude::*;
// self
use bouncie_bridge::{
	_preludet::*,
	auth::{EntryId, TokenSecret},
	flows::TokenRequest,
	store::EntryStore,
};

const REDIRECT_URI: &str = "https://bridge.example.com/auth/external/callback";
const OUTAGE_BODY: &str =
	r#"{"error":"upstream_unavailable","error_description":"Outage caused by maintenance"}"#;

fn redirect_uri() -> Url {
	Url::parse(REDIRECT_URI).expect("Redirect URI should parse successfully.")
}

fn entry_id(raw: &str) -> EntryId {
	EntryId::new(raw).expect("Entry identifier should be valid for refresh test.")
}

async fn seed(store: &dyn EntryStore, entry: &EntryId, access: &str, expires_in: Duration) {
	store
		.save(test_entry(entry, Some(test_token(entry, access, expires_in))))
		.await
		.expect("Failed to seed the entry into the store.");
}

#[tokio::test]
async fn expired_tokens_are_refreshed_by_replaying_the_code() {
	let server = MockServer::start_async().await;
	let (session, store) =
		build_reqwest_test_session(mock_descriptor(&server.base_url()), redirect_uri());
	let entry = entry_id("entry-replay");

	seed(store.as_ref(), &entry, "access-old", Duration::minutes(1)).await;

	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/token")
				.form_urlencoded_tuple("grant_type", "authorization_code")
				.form_urlencoded_tuple("code", "sausages")
				.form_urlencoded_tuple("redirect_uri", REDIRECT_URI);
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-new", 3600));
		})
		.await;
	let record = session
		.ensure_token_valid(TokenRequest::new(entry.clone()))
		.await
		.expect("Code replay refresh should succeed.");

	mock.assert_async().await;

	assert_eq!(record.access_token.expose(), "access-new");
	assert_eq!(record.authorization_code.as_ref().map(TokenSecret::expose), Some("sausages"));

	let stored = store
		.fetch(&entry)
		.await
		.expect("Store fetch should succeed.")
		.and_then(|entry| entry.token)
		.expect("Refreshed token should be stored.");

	assert_eq!(stored.access_token.expose(), "access-new");
	assert_eq!(stored.authorization_code.as_ref().map(TokenSecret::expose), Some("sausages"));
}

#[tokio::test]
async fn fresh_tokens_skip_the_provider() {
	let server = MockServer::start_async().await;
	let (session, store) =
		build_reqwest_test_session(mock_descriptor(&server.base_url()), redirect_uri());
	let entry = entry_id("entry-fresh");

	seed(store.as_ref(), &entry, "access-fresh", Duration::hours(2)).await;

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(500);
		})
		.await;
	let record = session
		.ensure_token_valid(TokenRequest::new(entry))
		.await
		.expect("Fresh token should be returned as is.");

	assert_eq!(record.access_token.expose(), "access-fresh");
	assert_eq!(mock.hits_async().await, 0);
}

#[tokio::test]
async fn concurrent_refreshes_hit_the_provider_once() {
	let server = MockServer::start_async().await;
	let (session, store) =
		build_reqwest_test_session(mock_descriptor(&server.base_url()), redirect_uri());
	let entry = entry_id("entry-singleflight");

	seed(store.as_ref(), &entry, "access-expiring", Duration::seconds(5)).await;

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-shared", 3600));
		})
		.await;
	let (first, second) = tokio::join!(
		session.ensure_token_valid(TokenRequest::new(entry.clone())),
		session.ensure_token_valid(TokenRequest::new(entry.clone())),
	);

	assert_eq!(mock.hits_async().await, 1);
	assert_eq!(
		first.expect("First refresh should succeed.").access_token.expose(),
		"access-shared"
	);
	assert_eq!(
		second.expect("Second refresh should succeed.").access_token.expose(),
		"access-shared"
	);
	assert_eq!(session.refresh_metrics.attempts(), 2);
	assert_eq!(session.refresh_metrics.successes(), 2);
}

#[tokio::test]
async fn rejected_replay_revokes_the_stored_token() {
	let server = MockServer::start_async().await;
	let (session, store) =
		build_reqwest_test_session(mock_descriptor(&server.base_url()), redirect_uri());
	let entry = entry_id("entry-rejected");

	seed(store.as_ref(), &entry, "access-rejected", Duration::seconds(-30)).await;

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(400)
				.header("content-type", "application/json")
				.body(r#"{"error":"invalid_grant"}"#);
		})
		.await;
	let err = session
		.ensure_token_valid(TokenRequest::new(entry.clone()))
		.await
		.expect_err("Rejected replay should fail.");

	assert!(matches!(err, Error::InvalidGrant { .. }));

	let stored = store
		.fetch(&entry)
		.await
		.expect("Store fetch should succeed.")
		.and_then(|entry| entry.token)
		.expect("Token should remain stored after revocation.");

	assert!(stored.is_revoked());

	let err = session
		.ensure_token_valid(TokenRequest::new(entry))
		.await
		.expect_err("Revoked token should require reauthentication.");

	assert!(matches!(err, Error::ReauthRequired(_)));
	assert!(err.requires_reauth());
	assert_eq!(mock.hits_async().await, 1);
}

#[tokio::test]
async fn provider_outages_leave_the_token_usable() {
	let server = MockServer::start_async().await;
	let (session, store) =
		build_reqwest_test_session(mock_descriptor(&server.base_url()), redirect_uri());
	let entry = entry_id("entry-outage");

	seed(store.as_ref(), &entry, "access-old", Duration::minutes(1)).await;

	for status in [403, 404, 503] {
		let mut outage = server
			.mock_async(move |when, then| {
				when.method(POST).path("/oauth/token");
				then.status(status).header("content-type", "application/json").body(OUTAGE_BODY);
			})
			.await;
		let err = session
			.ensure_token_valid(TokenRequest::new(entry.clone()))
			.await
			.expect_err("Outage should fail the refresh.");

		assert!(!err.requires_reauth(), "status {status}: {err:?}");

		outage.delete_async().await;
	}

	server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("access-recovered", 3600));
		})
		.await;

	let record = session
		.ensure_token_valid(TokenRequest::new(entry.clone()))
		.await
		.expect("Refresh should succeed once the provider recovers.");

	assert_eq!(record.access_token.expose(), "access-recovered");
}

#[tokio::test]
async fn entries_without_tokens_require_reauthentication() {
	let server = MockServer::start_async().await;
	let (session, store) =
		build_reqwest_test_session(mock_descriptor(&server.base_url()), redirect_uri());
	let entry = entry_id("entry-empty");

	store.save(test_entry(&entry, None)).await.expect("Seeding the entry should succeed.");

	assert!(matches!(
		session.ensure_token_valid(TokenRequest::new(entry)).await,
		Err(Error::ReauthRequired(_))
	));
	assert!(matches!(
		session.ensure_token_valid(TokenRequest::new(entry_id("entry-ghost"))).await,
		Err(Error::UnknownEntry(_))
	));
}
