// self
use crate::obs::{FlowKind, FlowOutcome};

/// Records an exchange outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"broker_exchange_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Counts verified results whose cache write failed but were delivered anyway.
pub fn record_cache_write_suppressed() {
	#[cfg(feature = "metrics")]
	metrics::counter!("broker_exchange_cache_write_suppressed_total").increment(1);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_are_noops_without_metrics() {
		record_flow_outcome(FlowKind::ProcessResponse, FlowOutcome::Failure);
		record_cache_write_suppressed();
	}
}
