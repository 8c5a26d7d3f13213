//! File-backed [`EntryStore`] that survives restarts of the bridge.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{EntryId, TokenRecord},
	entry::ConfigEntry,
	store::{self, CompareAndSwapOutcome, EntryStore, StoreError, StoreFuture},
};

/// Persists entries to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<BTreeMap<EntryId, ConfigEntry>>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	fn load_snapshot(path: &Path) -> Result<BTreeMap<EntryId, ConfigEntry>, StoreError> {
		if !path.exists() {
			return Ok(BTreeMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(BTreeMap::new());
		}

		let entries: Vec<ConfigEntry> =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(entries.into_iter().map(|entry| (entry.entry_id.clone(), entry)).collect())
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, contents: &BTreeMap<EntryId, ConfigEntry>) -> Result<(), StoreError> {
		let snapshot: Vec<_> = contents.values().collect();
		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl EntryStore for FileStore {
	fn save(&self, entry: ConfigEntry) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			guard.insert(entry.entry_id.clone(), entry);
			self.persist_locked(&guard)
		})
	}

	fn fetch<'a>(&'a self, entry_id: &'a EntryId) -> StoreFuture<'a, Option<ConfigEntry>> {
		Box::pin(async move { Ok(self.inner.read().get(entry_id).cloned()) })
	}

	fn list(&self) -> StoreFuture<'_, Vec<ConfigEntry>> {
		Box::pin(async move { Ok(self.inner.read().values().cloned().collect()) })
	}

	fn remove<'a>(&'a self, entry_id: &'a EntryId) -> StoreFuture<'a, Option<ConfigEntry>> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let removed = guard.remove(entry_id);

			if removed.is_some() {
				self.persist_locked(&guard)?;
			}

			Ok(removed)
		})
	}

	fn compare_and_swap_token<'a>(
		&'a self,
		entry_id: &'a EntryId,
		expected_access: Option<&'a str>,
		replacement: TokenRecord,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let outcome = store::swap_token(&mut guard, entry_id, expected_access, replacement);

			if matches!(outcome, CompareAndSwapOutcome::Updated) {
				self.persist_locked(&guard)?;
			}

			Ok(outcome)
		})
	}

	fn revoke_token<'a>(
		&'a self,
		entry_id: &'a EntryId,
		instant: OffsetDateTime,
	) -> StoreFuture<'a, Option<TokenRecord>> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let revoked = store::revoke_in(&mut guard, entry_id, instant);

			if revoked.is_some() {
				self.persist_locked(&guard)?;
			}

			Ok(revoked)
		})
	}
}
