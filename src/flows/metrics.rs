// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for broker exchanges.
#[derive(Debug, Default)]
pub struct ExchangeMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	suppressed: AtomicU64,
}
impl ExchangeMetrics {
	/// Returns the number of requests handed to [`acquire_token`](crate::flows::BrokerClient::acquire_token).
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of successful results delivered.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed results delivered, including failures before delegation.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns the number of cache-write failures that were logged and suppressed.
	pub fn suppressed_cache_writes(&self) -> u64 {
		self.suppressed.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_suppressed(&self) {
		self.suppressed.fetch_add(1, Ordering::Relaxed);
	}
}
