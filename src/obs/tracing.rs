// self
use crate::{_prelude::*, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by the exchange halves.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("broker_exchange.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a debug event when an exchange reaches `stage`.
pub fn record_stage(kind: FlowKind, stage: &'static str) {
	#[cfg(feature = "tracing")]
	tracing::debug!(flow = kind.as_str(), stage, "Broker exchange advanced.");

	#[cfg(not(feature = "tracing"))]
	let _ = (kind, stage);
}

/// Emits a warning for a failure that was logged instead of returned.
pub fn record_suppressed(kind: FlowKind, error: &Error) {
	#[cfg(feature = "tracing")]
	tracing::warn!(flow = kind.as_str(), error = %error, "Broker exchange suppressed a failure.");

	#[cfg(not(feature = "tracing"))]
	let _ = (kind, error);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn events_are_noops_without_tracing() {
		record_stage(FlowKind::BuildRequest, "test");
		record_suppressed(FlowKind::ProcessResponse, &Error::Superseded);
	}

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = FlowSpan::new(FlowKind::ProcessResponse, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
