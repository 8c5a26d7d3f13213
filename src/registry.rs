//! OAuth implementations keyed by application client identifier.
//!
//! Every configured application registers its [`ReqwestAuthSession`] here under its client id.
//! The webhook endpoint authorizes deliveries against the same keys.

// self
use crate::{_prelude::*, auth::ClientId, flows::ReqwestAuthSession};

/// Registered OAuth implementations.
#[derive(Clone, Debug, Default)]
pub struct ImplementationRegistry {
	sessions: Arc<RwLock<BTreeMap<ClientId, Arc<ReqwestAuthSession>>>>,
}
impl ImplementationRegistry {
	/// Registers `session` under its client id, replacing any previous registration.
	pub fn register(&self, session: Arc<ReqwestAuthSession>) -> Arc<ReqwestAuthSession> {
		let client_id = session.credentials.client_id.clone();

		tracing::debug!(client_id = %client_id, "Registering OAuth implementation.");

		self.sessions.write().insert(client_id, session.clone());

		session
	}

	/// Returns the implementation registered for `client_id`.
	pub fn get(&self, client_id: &str) -> Option<Arc<ReqwestAuthSession>> {
		self.sessions.read().get(client_id).cloned()
	}

	/// Returns the registered client id equal to `candidate`, if any.
	pub fn authorize(&self, candidate: &str) -> Option<ClientId> {
		self.sessions.read().get_key_value(candidate).map(|(client_id, _)| client_id.clone())
	}

	/// Whether `client_id` is registered.
	pub fn contains(&self, client_id: &str) -> bool {
		self.sessions.read().contains_key(client_id)
	}

	/// Drops the implementation registered for `client_id`.
	pub fn remove(&self, client_id: &str) -> Option<Arc<ReqwestAuthSession>> {
		self.sessions.write().remove(client_id)
	}

	/// Registered client ids in order.
	pub fn client_ids(&self) -> Vec<ClientId> {
		self.sessions.read().keys().cloned().collect()
	}
}
