//! Storage contracts and built-in stores for config entries and their tokens.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{EntryId, TokenRecord, TokenSecret},
	entry::ConfigEntry,
};

/// Boxed future returned by [`EntryStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract implemented by config entry stores.
pub trait EntryStore
where
	Self: Send + Sync,
{
	/// Persists or replaces an entry.
	fn save(&self, entry: ConfigEntry) -> StoreFuture<'_, ()>;

	/// Fetches the entry with the provided identifier, if present.
	fn fetch<'a>(&'a self, entry_id: &'a EntryId) -> StoreFuture<'a, Option<ConfigEntry>>;

	/// Lists every stored entry ordered by identifier.
	fn list(&self) -> StoreFuture<'_, Vec<ConfigEntry>>;

	/// Removes an entry, returning it when it existed.
	fn remove<'a>(&'a self, entry_id: &'a EntryId) -> StoreFuture<'a, Option<ConfigEntry>>;

	/// Atomically replaces the entry's token if its access token still matches `expected_access`.
	fn compare_and_swap_token<'a>(
		&'a self,
		entry_id: &'a EntryId,
		expected_access: Option<&'a str>,
		replacement: TokenRecord,
	) -> StoreFuture<'a, CompareAndSwapOutcome>;

	/// Marks the entry's token as revoked at the provided instant.
	fn revoke_token<'a>(
		&'a self,
		entry_id: &'a EntryId,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, Option<TokenRecord>>;
}

/// Result of a token compare-and-swap attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareAndSwapOutcome {
	/// The access token matched the expected value and the record was replaced.
	Updated,
	/// The entry exists but its access token changed in the meantime.
	TokenMismatch,
	/// No entry matched the identifier.
	Missing,
}

/// Error type produced by [`EntryStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Applies a compare-and-swap against an in-memory entry map.
pub(crate) fn swap_token(
	entries: &mut BTreeMap<EntryId, ConfigEntry>,
	entry_id: &EntryId,
	expected_access: Option<&str>,
	replacement: TokenRecord,
) -> CompareAndSwapOutcome {
	let Some(entry) = entries.get_mut(entry_id) else {
		return CompareAndSwapOutcome::Missing;
	};
	let current = entry.token.as_ref().map(|token| &token.access_token).map(TokenSecret::expose);

	if current != expected_access {
		return CompareAndSwapOutcome::TokenMismatch;
	}

	entry.token = Some(replacement);

	CompareAndSwapOutcome::Updated
}

/// Marks the token of `entry_id` revoked inside an in-memory entry map.
pub(crate) fn revoke_in(
	entries: &mut BTreeMap<EntryId, ConfigEntry>,
	entry_id: &EntryId,
	instant: OffsetDateTime,
) -> Option<TokenRecord> {
	let token = entries.get_mut(entry_id)?.token.as_mut()?;

	token.revoke(instant);

	Some(token.clone())
}
