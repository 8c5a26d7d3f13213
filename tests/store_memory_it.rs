// crates.io
use time::macros;
// self
use bouncie_bridge::{
	_preludet::*,
	auth::{EntryId, TokenRecord, TokenStatus},
	store::{CompareAndSwapOutcome, EntryStore, MemoryStore},
};

fn entry_id(raw: &str) -> EntryId {
	EntryId::new(raw).expect("Entry identifier fixture should be valid.")
}

fn build_record(entry: &EntryId, access: &str) -> TokenRecord {
	let issued = macros::datetime!(2025-11-10 12:00 UTC);

	TokenRecord::builder(entry.clone())
		.access_token(access)
		.authorization_code("sausages")
		.issued_at(issued)
		.expires_at(issued + Duration::hours(1))
		.build()
		.expect("Token record fixture should build successfully.")
}

#[tokio::test]
async fn entries_are_listed_in_identifier_order() {
	let store = MemoryStore::default();
	let second = entry_id("entry-b");
	let first = entry_id("entry-a");

	store.save(test_entry(&second, None)).await.expect("Saving the second entry should succeed.");
	store.save(test_entry(&first, None)).await.expect("Saving the first entry should succeed.");

	let listed = store.list().await.expect("Listing entries should succeed.");

	assert_eq!(
		listed.iter().map(|entry| entry.entry_id.as_ref()).collect::<Vec<_>>(),
		["entry-a", "entry-b"]
	);

	let removed = store
		.remove(&first)
		.await
		.expect("Removing an entry should succeed.")
		.expect("Removed entry should be returned.");

	assert_eq!(removed.entry_id, first);
	assert!(store.fetch(&first).await.expect("Fetch should succeed.").is_none());
	assert!(store.remove(&first).await.expect("Second removal should succeed.").is_none());
}

#[tokio::test]
async fn token_swap_requires_matching_access_token() {
	let store = MemoryStore::default();
	let id = entry_id("entry-swap");

	store
		.save(test_entry(&id, Some(build_record(&id, "access-1"))))
		.await
		.expect("Seeding the entry should succeed.");

	let mismatch = store
		.compare_and_swap_token(&id, Some("stale"), build_record(&id, "access-2"))
		.await
		.expect("Mismatched swap should complete.");

	assert_eq!(mismatch, CompareAndSwapOutcome::TokenMismatch);

	let updated = store
		.compare_and_swap_token(&id, Some("access-1"), build_record(&id, "access-2"))
		.await
		.expect("Matching swap should complete.");

	assert_eq!(updated, CompareAndSwapOutcome::Updated);

	let stored = store
		.fetch(&id)
		.await
		.expect("Fetch should succeed.")
		.and_then(|entry| entry.token)
		.expect("Swapped token should be stored.");

	assert_eq!(stored.access_token.expose(), "access-2");

	let missing = store
		.compare_and_swap_token(&entry_id("ghost"), None, build_record(&id, "access-3"))
		.await
		.expect("Swap on a missing entry should complete.");

	assert_eq!(missing, CompareAndSwapOutcome::Missing);
}

#[tokio::test]
async fn revoke_marks_the_stored_token() {
	let store = MemoryStore::default();
	let id = entry_id("entry-revoke");
	let instant = macros::datetime!(2025-11-10 12:30 UTC);

	store
		.save(test_entry(&id, Some(build_record(&id, "access-1"))))
		.await
		.expect("Seeding the entry should succeed.");

	let revoked = store
		.revoke_token(&id, instant)
		.await
		.expect("Revocation should succeed.")
		.expect("Revoked token should be returned.");

	assert_eq!(revoked.revoked_at, Some(instant));
	assert_eq!(revoked.status_at(instant), TokenStatus::Revoked);
	assert!(
		store
			.revoke_token(&entry_id("ghost"), instant)
			.await
			.expect("Revocation should succeed.")
			.is_none()
	);
}
