// crates.io
use tracing::{Instrument, instrument::Instrumented};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
// self
use crate::{_prelude::*, obs::FlowKind};

/// Filter applied when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "bouncie_bridge=info";

/// Installs the global fmt subscriber, honoring `RUST_LOG` when present.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing() -> bool {
	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
		.with(tracing_subscriber::fmt::layer().with_target(false))
		.try_init()
		.is_ok()
}

/// A span builder used by bridge flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		Self { span: tracing::info_span!("bouncie.flow", flow = kind.as_str(), stage) }
	}

	/// Enters the span for synchronous sections.
	pub fn entered(self) -> tracing::span::EnteredSpan {
		self.span.entered()
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.span.clone())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::{FlowKind, FlowSpan};

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = FlowSpan::new(FlowKind::Poll, "instrument_wraps_future");

		assert_eq!(span.instrument(async { 42 }).await, 42);
	}
}
