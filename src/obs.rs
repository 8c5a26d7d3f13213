//! Observability helpers for bridge flows.
//!
//! Every flow runs inside a `bouncie.flow` span carrying `flow` and `stage` fields. Enable the
//! `metrics` feature to increment the `bouncie_flow_total` counter for every
//! attempt/success/failure, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use self::metrics::*;
pub use self::tracing::*;

// self
use crate::_prelude::*;

/// Flow kinds observed by the bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Authorization code exchange.
	Authorization,
	/// Token refresh (code replay or refresh grant).
	Refresh,
	/// Scheduled vehicle poll.
	Poll,
	/// Inbound webhook delivery.
	Webhook,
	/// Config entry setup.
	Setup,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Authorization => "authorization",
			FlowKind::Refresh => "refresh",
			FlowKind::Poll => "poll",
			FlowKind::Webhook => "webhook",
			FlowKind::Setup => "setup",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside a flow span and records attempt plus final outcome.
pub async fn observe<T, Fut>(kind: FlowKind, stage: &'static str, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = FlowSpan::new(kind, stage).instrument(fut).await;

	match &result {
		Ok(_) => record_flow_outcome(kind, FlowOutcome::Success),
		Err(_) => record_flow_outcome(kind, FlowOutcome::Failure),
	}

	result
}
