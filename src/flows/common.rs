//! Shared helpers for flow implementations (token requests, guards, random state).

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	auth::{EntryId, TokenRecord},
	flows::AuthSession,
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
};

/// Parameters for [`AuthSession::ensure_token_valid`].
#[derive(Clone, Debug)]
pub struct TokenRequest {
	/// Entry whose token should be valid.
	pub entry: EntryId,
	/// Forces a refresh even when the cached token is still fresh.
	pub force: bool,
	/// Jittered preemptive window used when refreshing early.
	pub preemptive_window: Duration,
}
impl TokenRequest {
	const DEFAULT_PREEMPTIVE_WINDOW: Duration = Duration::seconds(60);

	/// Creates a request for the provided entry.
	pub fn new(entry: EntryId) -> Self {
		Self { entry, force: false, preemptive_window: Self::DEFAULT_PREEMPTIVE_WINDOW }
	}

	/// Forces the session to refresh regardless of expiry.
	pub fn force_refresh(mut self) -> Self {
		self.force = true;

		self
	}

	/// Overrides the jittered preemptive window (defaults to 60 seconds).
	pub fn with_preemptive_window(mut self, window: Duration) -> Self {
		self.preemptive_window = if window.is_negative() { Duration::ZERO } else { window };

		self
	}

	/// Determines whether the cached record should be refreshed.
	pub fn should_refresh(&self, record: &TokenRecord, now: OffsetDateTime) -> bool {
		if self.force || record.is_revoked() || record.is_expired_at(now) {
			return true;
		}

		let effective_window = self.effective_preemptive_window();

		if effective_window.is_zero() {
			return false;
		}

		record.expires_at - now <= effective_window
	}

	fn effective_preemptive_window(&self) -> Duration {
		self.preemptive_window.checked_sub(self.preemptive_jitter()).unwrap_or(Duration::ZERO)
	}

	// Deterministic per entry so concurrent callers agree on the refresh instant.
	fn preemptive_jitter(&self) -> Duration {
		let window_secs = self.preemptive_window.whole_seconds();

		if window_secs <= 1 {
			return Duration::ZERO;
		}

		let modulus = u64::try_from(window_secs).unwrap_or(u64::MAX);
		let mut hasher = DefaultHasher::new();

		self.entry.hash(&mut hasher);

		let jitter_secs = hasher.finish() % modulus;

		Duration::seconds(i64::try_from(jitter_secs).unwrap_or(i64::MAX))
	}
}

/// Returns (and creates on demand) the singleflight guard for an entry.
pub(crate) fn flow_guard<C, M>(session: &AuthSession<C, M>, entry: &EntryId) -> Arc<AsyncMutex<()>>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let mut guards = session.flow_guards.lock();

	guards.entry(entry.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
}

/// Random alphanumeric string used for OAuth `state` values and entry identifiers.
pub fn random_string(len: usize) -> String {
	rand::rng().sample_iter(&Alphanumeric).take(len).map(char::from).collect()
}
