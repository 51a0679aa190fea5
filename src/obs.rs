//! Optional observability helpers for broker exchanges.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `broker_exchange.flow` with the `flow`
//!   (exchange half) and `stage` (call site) fields, plus events for state transitions and
//!   suppressed cache failures.
//! - Enable `metrics` to increment the `broker_exchange_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`, and
//!   `broker_exchange_cache_write_suppressed_total` for cache writes that failed under the
//!   best-effort policy.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Halves of a broker exchange observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Building and dispatching the outbound request.
	BuildRequest,
	/// Validating and decoding the broker response.
	ProcessResponse,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::BuildRequest => "build_request",
			FlowKind::ProcessResponse => "process_response",
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
	/// Entry to an exchange half.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure delivered back to the caller.
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
