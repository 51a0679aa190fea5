//! Broker exchange orchestration powered by the [`BrokerClient`] facade.

pub mod completion;
pub mod request;
pub mod response;

mod cache;
mod metrics;

pub use completion::*;
pub use metrics::ExchangeMetrics;
pub use request::*;
pub use response::*;

// self
use crate::{
	_prelude::*,
	auth::AuthenticationResult,
	config::BrokerConfig,
	crypto::BrokerKeyProvider,
	ext::BrokerInvoker,
	obs::{self, FlowKind, FlowOutcome},
	resume::ResumeStateStore,
	store::TokenCacheResolver,
};

/// Coordinates broker exchanges for one application.
///
/// The client owns the configuration and the injected collaborators so the request builder and
/// response processor only deal with protocol logic. Starting a request and processing a response
/// are serialized so the resume slot and the completion registry always move together.
#[derive(Clone)]
pub struct BrokerClient {
	/// Validated client configuration.
	pub config: BrokerConfig,
	/// Single-slot store for the in-flight request.
	pub resume_store: Arc<dyn ResumeStateStore>,
	/// Source of the key shared with the broker.
	pub key_provider: Arc<dyn BrokerKeyProvider>,
	/// Resolves the token cache of a shared cache group.
	pub cache_resolver: Arc<dyn TokenCacheResolver>,
	/// Launches the broker application.
	pub invoker: Arc<dyn BrokerInvoker>,
	/// Shared counters for exchange outcomes.
	pub metrics: Arc<ExchangeMetrics>,
	completions: Arc<CompletionRegistry>,
	exchange_guard: Arc<AsyncMutex<()>>,
}
impl BrokerClient {
	/// Creates a client from its configuration and collaborators.
	pub fn new(
		config: BrokerConfig,
		resume_store: Arc<dyn ResumeStateStore>,
		key_provider: Arc<dyn BrokerKeyProvider>,
		cache_resolver: Arc<dyn TokenCacheResolver>,
		invoker: Arc<dyn BrokerInvoker>,
	) -> Self {
		Self {
			config,
			resume_store,
			key_provider,
			cache_resolver,
			invoker,
			metrics: Default::default(),
			completions: Default::default(),
			exchange_guard: Default::default(),
		}
	}

	/// Returns the most recent result that arrived while no caller was waiting, once.
	///
	/// This is how an application relaunched by the broker picks up the outcome of a request
	/// started by a previous process.
	pub fn take_interrupted_result(&self) -> Option<AuthenticationResult> {
		self.completions.take_interrupted()
	}

	/// Returns `true` while a caller is waiting for a broker response.
	pub fn has_pending_request(&self) -> bool {
		self.completions.has_pending()
	}

	fn record_outcome(&self, kind: FlowKind, result: &AuthenticationResult) {
		if result.is_success() {
			self.metrics.record_success();
			obs::record_flow_outcome(kind, FlowOutcome::Success);
		} else {
			self.metrics.record_failure();
			obs::record_flow_outcome(kind, FlowOutcome::Failure);
		}
	}
}
impl Debug for BrokerClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BrokerClient")
			.field("config", &self.config)
			.field("metrics", &self.metrics)
			.field("pending_request", &self.completions.has_pending())
			.finish()
	}
}
