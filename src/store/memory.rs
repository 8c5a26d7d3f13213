//! Thread-safe in-memory [`EntryStore`] for tests and ephemeral deployments.

// self
use crate::{
	_prelude::*,
	auth::{EntryId, TokenRecord},
	entry::ConfigEntry,
	store::{self, CompareAndSwapOutcome, EntryStore, StoreFuture},
};

type EntryMap = Arc<RwLock<BTreeMap<EntryId, ConfigEntry>>>;

/// Storage backend that keeps entries in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(EntryMap);
impl EntryStore for MemoryStore {
	fn save(&self, entry: ConfigEntry) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().insert(entry.entry_id.clone(), entry);

			Ok(())
		})
	}

	fn fetch<'a>(&'a self, entry_id: &'a EntryId) -> StoreFuture<'a, Option<ConfigEntry>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(entry_id).cloned()) })
	}

	fn list(&self) -> StoreFuture<'_, Vec<ConfigEntry>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().values().cloned().collect()) })
	}

	fn remove<'a>(&'a self, entry_id: &'a EntryId) -> StoreFuture<'a, Option<ConfigEntry>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.write().remove(entry_id)) })
	}

	fn compare_and_swap_token<'a>(
		&'a self,
		entry_id: &'a EntryId,
		expected_access: Option<&'a str>,
		replacement: TokenRecord,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		let map = self.0.clone();

		Box::pin(async move {
			Ok(store::swap_token(&mut map.write(), entry_id, expected_access, replacement))
		})
	}

	fn revoke_token<'a>(
		&'a self,
		entry_id: &'a EntryId,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, Option<TokenRecord>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(store::revoke_in(&mut map.write(), entry_id, instant)) })
	}
}
