//! Config flow: collects application credentials, sends the user through the Bouncie consent
//! page, and turns the returned code into a config entry.
//!
//! A user flow runs `step_user` (form, then authorize URL) and finishes in `step_callback`
//! once the OAuth redirect arrives. A reauthentication flow is opened by setup when the stored
//! authorization is rejected; `step_reauth_confirm` resumes it with the stored credentials and
//! `step_callback` updates and reloads the existing entry.

// crates.io
use parking_lot::MutexGuard;
// self
use crate::{
	_prelude::*,
	auth::EntryId,
	entry::{ConfigEntry, Credentials, EntrySource},
	error::ConfigError,
	flows::{AuthorizationSession, ReqwestAuthSession, random_string},
	integration::{Integration, SetupOutcome},
};

/// Fields collected by the user step.
pub const USER_FIELDS: [&str; 3] = ["client_id", "client_secret", "api_key"];
/// Title of created entries.
pub const ENTRY_TITLE: &str = "bouncie";

/// How long a flow may wait for user input or the OAuth redirect before it is dropped.
pub const FLOW_TIMEOUT: Duration = Duration::minutes(30);

const FLOW_ID_LEN: usize = 32;
const ENTRY_ID_LEN: usize = 26;

/// Reason a flow ended without creating an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
	/// No external URL is configured, so no redirect URI exists.
	NoExternalUrl,
	/// An entry with the same unique id already exists.
	AlreadyConfigured,
	/// Another flow for the same unique id is in progress.
	AlreadyInProgress,
	/// The existing entry received fresh tokens and was reloaded.
	ReauthSuccessful,
}
impl AbortReason {
	/// Stable label.
	pub const fn as_str(self) -> &'static str {
		match self {
			AbortReason::NoExternalUrl => "no_external_url",
			AbortReason::AlreadyConfigured => "already_configured",
			AbortReason::AlreadyInProgress => "already_in_progress",
			AbortReason::ReauthSuccessful => "reauth_successful",
		}
	}
}
impl Display for AbortReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Next thing the user has to do, or how the flow ended.
#[derive(Clone, Debug, PartialEq)]
pub enum FlowResult {
	/// Show a form.
	Form {
		/// Flow to resume, for forms of an existing flow.
		flow_id: Option<String>,
		/// Step the form belongs to.
		step_id: &'static str,
		/// Required fields.
		fields: &'static [&'static str],
	},
	/// Send the user to an external page; the flow resumes at the OAuth callback.
	External {
		/// Flow identifier.
		flow_id: String,
		/// Authorize URL.
		url: Url,
	},
	/// A new entry was stored and set up.
	CreateEntry {
		/// Identifier of the new entry.
		entry_id: EntryId,
		/// Entry title.
		title: String,
		/// Setup result.
		outcome: SetupOutcome,
	},
	/// The flow ended.
	Abort {
		/// Why.
		reason: AbortReason,
	},
}
impl FlowResult {
	fn abort(reason: AbortReason) -> Self {
		Self::Abort { reason }
	}
}

/// Summary of a pending flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowProgress {
	/// Flow identifier.
	pub flow_id: String,
	/// Whether the flow creates an entry or reauthenticates one.
	pub source: EntrySource,
	/// Unique id the flow targets.
	pub unique_id: String,
}

#[derive(Debug)]
enum FlowStage {
	ReauthConfirm {
		entry_id: EntryId,
		credentials: Credentials,
	},
	External {
		session: Arc<ReqwestAuthSession>,
		authorization: AuthorizationSession,
		credentials: Credentials,
	},
}

#[derive(Debug)]
struct PendingFlow {
	source: EntrySource,
	unique_id: String,
	stage: FlowStage,
	started_at: OffsetDateTime,
}
impl PendingFlow {
	fn new(source: EntrySource, unique_id: String, stage: FlowStage) -> Self {
		Self { source, unique_id, stage, started_at: OffsetDateTime::now_utc() }
	}

	fn state(&self) -> Option<&str> {
		match &self.stage {
			FlowStage::External { authorization, .. } => Some(authorization.state.as_str()),
			FlowStage::ReauthConfirm { .. } => None,
		}
	}
}

/// Flows waiting for user input or an OAuth redirect, keyed by flow id.
///
/// Flows older than [`FLOW_TIMEOUT`] are dropped whenever the table is consulted.
#[derive(Debug, Default)]
pub struct ConfigFlows(Mutex<HashMap<String, PendingFlow>>);
impl ConfigFlows {
	fn live(&self) -> MutexGuard<'_, HashMap<String, PendingFlow>> {
		let mut flows = self.0.lock();
		let cutoff = OffsetDateTime::now_utc() - FLOW_TIMEOUT;

		flows.retain(|flow_id, flow| {
			let live = flow.started_at > cutoff;

			if !live {
				tracing::info!(flow_id = %flow_id, unique_id = %flow.unique_id, "Flow timed out.");
			}

			live
		});

		flows
	}

	fn insert(&self, flow: PendingFlow) -> String {
		let flow_id = random_string(FLOW_ID_LEN);

		self.live().insert(flow_id.clone(), flow);

		flow_id
	}

	fn in_progress(&self, unique_id: &str, source: Option<EntrySource>) -> bool {
		self.live().values().any(|flow| {
			flow.unique_id == unique_id && source.is_none_or(|source| flow.source == source)
		})
	}

	fn take_reauth(&self, flow_id: &str) -> Option<PendingFlow> {
		let mut flows = self.live();
		let confirming = matches!(flows.get(flow_id)?.stage, FlowStage::ReauthConfirm { .. });

		if confirming { flows.remove(flow_id) } else { None }
	}

	fn take_by_state(&self, state: &str) -> Option<PendingFlow> {
		let mut flows = self.live();
		let flow_id = flows
			.iter()
			.find(|(_, flow)| flow.state() == Some(state))
			.map(|(flow_id, _)| flow_id.clone())?;

		flows.remove(&flow_id)
	}

	/// Drops the flow `flow_id`; returns whether it was pending.
	pub fn abort(&self, flow_id: &str) -> bool {
		self.live().remove(flow_id).is_some()
	}

	/// Pending flows.
	pub fn progress(&self) -> Vec<FlowProgress> {
		self.live()
			.iter()
			.map(|(flow_id, flow)| FlowProgress {
				flow_id: flow_id.clone(),
				source: flow.source,
				unique_id: flow.unique_id.clone(),
			})
			.collect()
	}
}

/// Lowercases and replaces every run of non-alphanumeric characters with one underscore.
pub fn slugify(value: &str) -> String {
	let mut slug = String::with_capacity(value.len());

	for c in value.trim().chars().flat_map(char::to_lowercase) {
		if c.is_alphanumeric() {
			slug.push(c);
		} else if !slug.is_empty() && !slug.ends_with('_') {
			slug.push('_');
		}
	}

	slug.trim_end_matches('_').to_owned()
}

/// Unique id of the entry created for `client_id`.
pub fn unique_id_for(client_id: &str) -> String {
	format!("{}_{}", crate::entity::DOMAIN, slugify(client_id))
}

impl Integration {
	/// Pending flows.
	pub fn flows_in_progress(&self) -> Vec<FlowProgress> {
		self.flows.progress()
	}

	/// Abandons a pending flow; returns whether it existed.
	pub fn abort_flow(&self, flow_id: &str) -> bool {
		self.flows.abort(flow_id)
	}

	/// Abandons the flow waiting for the redirect carrying `state`, after the user declined
	/// consent; returns whether such a flow existed.
	pub fn decline_authorization(&self, state: &str) -> bool {
		let Some(flow) = self.flows.take_by_state(state) else {
			return false;
		};

		tracing::info!(
			unique_id = %flow.unique_id,
			source = ?flow.source,
			"Authorization declined."
		);

		true
	}

	/// User step: shows the credentials form, or registers the implementation and returns
	/// the authorize URL once credentials are submitted.
	pub async fn step_user(&self, input: Option<Credentials>) -> Result<FlowResult> {
		if let Some(abort) = self.abort_without_external_url()? {
			return Ok(abort);
		}

		let Some(credentials) = input else {
			return Ok(FlowResult::Form { flow_id: None, step_id: "user", fields: &USER_FIELDS });
		};
		let unique_id = unique_id_for(&credentials.client_id);

		if self.entry_by_unique_id(&unique_id).await?.is_some() {
			return Ok(FlowResult::abort(AbortReason::AlreadyConfigured));
		}
		if self.flows.in_progress(&unique_id, None) {
			return Ok(FlowResult::abort(AbortReason::AlreadyInProgress));
		}

		let entry_id = EntryId::new(random_string(ENTRY_ID_LEN)).map_err(ConfigError::from)?;

		self.begin_authorization(EntrySource::User, unique_id, entry_id, credentials)
	}

	/// Opens a reauthentication flow for `entry`; returns `None` when one is already pending.
	pub fn start_reauth(&self, entry: &ConfigEntry) -> Option<String> {
		if self.flows.in_progress(&entry.unique_id, Some(EntrySource::Reauth)) {
			tracing::debug!(unique_id = %entry.unique_id, "Reauthentication already in progress.");

			return None;
		}

		let flow_id = self.flows.insert(PendingFlow::new(
			EntrySource::Reauth,
			entry.unique_id.clone(),
			FlowStage::ReauthConfirm {
				entry_id: entry.entry_id.clone(),
				credentials: entry.credentials.clone(),
			},
		));

		tracing::info!(entry = %entry.entry_id, flow_id = %flow_id, "Reauthentication required.");

		// Nobody may be listening; the flow stays pending either way.
		let _ = self.reauth_requests.send(FlowProgress {
			flow_id: flow_id.clone(),
			source: EntrySource::Reauth,
			unique_id: entry.unique_id.clone(),
		});

		Some(flow_id)
	}

	/// Reauth confirmation: shows an empty form until `confirm` is set, then returns the
	/// authorize URL for the stored credentials.
	pub async fn step_reauth_confirm(&self, flow_id: &str, confirm: bool) -> Result<FlowResult> {
		if !confirm {
			return Ok(FlowResult::Form {
				flow_id: Some(flow_id.to_owned()),
				step_id: "reauth_confirm",
				fields: &[],
			});
		}

		let flow = self
			.flows
			.take_reauth(flow_id)
			.ok_or_else(|| Error::InvalidGrant { reason: "unknown reauthentication flow".into() })?;
		let FlowStage::ReauthConfirm { entry_id, credentials } = flow.stage else {
			return Err(Error::InvalidGrant { reason: "unknown reauthentication flow".into() });
		};

		if let Some(abort) = self.abort_without_external_url()? {
			return Ok(abort);
		}

		self.begin_authorization(EntrySource::Reauth, flow.unique_id, entry_id, credentials)
	}

	/// OAuth redirect: exchanges `code` and creates the entry, or updates and reloads it for a
	/// reauthentication.
	pub async fn step_callback(&self, state: &str, code: &str) -> Result<FlowResult> {
		let flow = self
			.flows
			.take_by_state(state)
			.ok_or_else(|| Error::InvalidGrant { reason: "authorization state mismatch".into() })?;
		let FlowStage::External { session, authorization, credentials } = flow.stage else {
			return Err(Error::InvalidGrant { reason: "authorization state mismatch".into() });
		};

		authorization.validate_state(state)?;

		let token = session.exchange_code(&authorization, code).await?;
		let entry_id = authorization.entry.clone();

		if flow.source == EntrySource::Reauth {
			if let Some(mut entry) = self.store().fetch(&entry_id).await? {
				entry.credentials = credentials;
				entry.auth_implementation = entry.credentials.client_id.clone();
				entry.token = Some(token);
				entry.source = EntrySource::Reauth;

				self.store().save(entry).await?;

				let outcome = self.reload(&entry_id).await?;

				tracing::info!(entry = %entry_id, ?outcome, "Reauthentication finished.");

				return Ok(FlowResult::abort(AbortReason::ReauthSuccessful));
			}
		}
		if self.entry_by_unique_id(&flow.unique_id).await?.is_some() {
			return Ok(FlowResult::abort(AbortReason::AlreadyConfigured));
		}

		let entry = ConfigEntry {
			entry_id: entry_id.clone(),
			unique_id: flow.unique_id,
			title: ENTRY_TITLE.into(),
			auth_implementation: credentials.client_id.clone(),
			credentials,
			token: Some(token),
			source: EntrySource::User,
		};

		self.store().save(entry).await?;

		let outcome = self.setup_entry(&entry_id).await?;

		Ok(FlowResult::CreateEntry { entry_id, title: ENTRY_TITLE.into(), outcome })
	}

	fn abort_without_external_url(&self) -> Result<Option<FlowResult>> {
		match self.ensure_external_url() {
			Ok(_) => Ok(None),
			Err(ConfigError::NoExternalUrl) =>
				Ok(Some(FlowResult::abort(AbortReason::NoExternalUrl))),
			Err(e) => Err(e.into()),
		}
	}

	fn begin_authorization(
		&self,
		source: EntrySource,
		unique_id: String,
		entry_id: EntryId,
		credentials: Credentials,
	) -> Result<FlowResult> {
		let redirect_uri = self.ensure_external_url()?;
		let session = self.implementation(credentials.clone())?;
		let authorization = session.start_authorization(entry_id, redirect_uri)?;
		let url = authorization.authorize_url.clone();
		let flow_id = self.flows.insert(PendingFlow::new(
			source,
			unique_id,
			FlowStage::External { session, authorization, credentials },
		));

		Ok(FlowResult::External { flow_id, url })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::test_credentials;

	fn reauth_flow(unique_id: &str, age: Duration) -> PendingFlow {
		let mut flow = PendingFlow::new(
			EntrySource::Reauth,
			unique_id.into(),
			FlowStage::ReauthConfirm {
				entry_id: EntryId::new("entry-flow").expect("Entry identifier should be valid."),
				credentials: test_credentials(),
			},
		);

		flow.started_at -= age;

		flow
	}

	#[test]
	fn stale_flows_stop_blocking_new_ones() {
		let flows = ConfigFlows::default();

		flows.insert(reauth_flow("bouncie_stale", FLOW_TIMEOUT + Duration::minutes(1)));

		let fresh = flows.insert(reauth_flow("bouncie_fresh", Duration::minutes(1)));

		assert!(!flows.in_progress("bouncie_stale", None));
		assert!(flows.in_progress("bouncie_fresh", Some(EntrySource::Reauth)));
		assert_eq!(flows.progress().len(), 1);
		assert!(flows.abort(&fresh));
		assert!(!flows.abort(&fresh));
		assert!(flows.progress().is_empty());
	}

	#[test]
	fn slugify_collapses_separators() {
		assert_eq!(slugify("spam-eggs"), "spam_eggs");
		assert_eq!(slugify("  Spam  Eggs!! "), "spam_eggs");
		assert_eq!(slugify("--abc--def--"), "abc_def");
		assert_eq!(unique_id_for("spam-eggs"), "bouncie_spam_eggs");
	}

	#[test]
	fn abort_reasons_use_snake_case_labels() {
		assert_eq!(AbortReason::NoExternalUrl.to_string(), "no_external_url");
		assert_eq!(AbortReason::ReauthSuccessful.as_str(), "reauth_successful");
		assert_eq!(
			serde_json::to_value(AbortReason::AlreadyConfigured).expect("Reason should serialize."),
			serde_json::json!("already_configured")
		);
	}
}
