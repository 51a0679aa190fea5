//! Exactly-once delivery of exchange results to the caller that started the request.

// std
use std::task::{Context, Poll};
// crates.io
use tokio::sync::oneshot;
// self
use crate::{_prelude::*, auth::AuthenticationResult};

#[derive(Debug, Default)]
struct RegistryState {
	pending: HashMap<Uuid, oneshot::Sender<AuthenticationResult>>,
	interrupted: Option<AuthenticationResult>,
}

/// Correlation-id keyed one-shot channels plus the interrupted-result slot.
///
/// At most one request is pending; registering a new one drops the previous sender so the
/// superseded caller resolves instead of waiting forever.
#[derive(Debug, Default)]
pub struct CompletionRegistry(Mutex<RegistryState>);
impl CompletionRegistry {
	/// Registers a waiter for `correlation_id`, superseding any pending waiter.
	pub fn register(&self, correlation_id: Uuid) -> PendingResult {
		let (tx, rx) = oneshot::channel();
		let mut state = self.0.lock();

		state.pending.clear();
		state.pending.insert(correlation_id, tx);

		PendingResult(PendingState::Waiting { rx, correlation_id })
	}

	/// Delivers `result` to its waiter, or keeps it as the interrupted result when nobody waits.
	///
	/// A result without a correlation id (no readable resume state) goes to the pending waiter,
	/// if any, and takes its correlation id. Returns `true` when a waiter received the result.
	pub fn complete(&self, mut result: AuthenticationResult) -> bool {
		let mut state = self.0.lock();
		let sender = match result.correlation_id {
			Some(id) => state.pending.remove(&id),
			None => {
				let lone = state.pending.drain().next();

				lone.map(|(id, tx)| {
					result.correlation_id = Some(id);

					tx
				})
			},
		};
		let undelivered = match sender {
			Some(tx) => match tx.send(result) {
				Ok(()) => return true,
				Err(result) => result,
			},
			None => result,
		};

		state.interrupted = Some(undelivered);

		false
	}

	/// Drops the waiter for `correlation_id` without delivering anything.
	pub fn cancel(&self, correlation_id: Uuid) {
		self.0.lock().pending.remove(&correlation_id);
	}

	/// Returns `true` while a waiter is registered.
	pub fn has_pending(&self) -> bool {
		!self.0.lock().pending.is_empty()
	}

	/// Returns the most recent undelivered result once.
	pub fn take_interrupted(&self) -> Option<AuthenticationResult> {
		self.0.lock().interrupted.take()
	}
}

#[derive(Debug)]
enum PendingState {
	Ready(Option<AuthenticationResult>),
	Waiting { rx: oneshot::Receiver<AuthenticationResult>, correlation_id: Uuid },
}

/// Future resolving to the [`AuthenticationResult`] of a broker request.
///
/// A request replaced by a newer one resolves to `Failed(Superseded)`.
#[derive(Debug)]
pub struct PendingResult(PendingState);
impl PendingResult {
	/// A result that is already known, typically a failure before delegation.
	pub fn ready(result: AuthenticationResult) -> Self {
		Self(PendingState::Ready(Some(result)))
	}

	/// Correlation id of the awaited request, when it reached the registry.
	pub fn correlation_id(&self) -> Option<Uuid> {
		match &self.0 {
			PendingState::Ready(result) => result.as_ref().and_then(|r| r.correlation_id),
			PendingState::Waiting { correlation_id, .. } => Some(*correlation_id),
		}
	}
}
impl Future for PendingResult {
	type Output = AuthenticationResult;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match &mut self.get_mut().0 {
			PendingState::Ready(result) => match result.take() {
				Some(result) => Poll::Ready(result),
				None => Poll::Ready(AuthenticationResult::failed(
					Error::internal("pending result polled after completion"),
					None,
				)),
			},
			PendingState::Waiting { rx, correlation_id } => Pin::new(rx).poll(cx).map(|received| {
				received.unwrap_or_else(|_| {
					AuthenticationResult::failed(Error::Superseded, Some(*correlation_id))
				})
			}),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn registered_waiter_receives_its_result() {
		let registry = CompletionRegistry::default();
		let id = Uuid::new_v4();
		let pending = registry.register(id);

		assert!(registry.complete(AuthenticationResult::failed(Error::HashMissing, Some(id))));
		assert!(matches!(pending.await.error(), Some(Error::HashMissing)));
		assert!(registry.take_interrupted().is_none());
	}

	#[tokio::test]
	async fn newer_registration_supersedes_the_pending_one() {
		let registry = CompletionRegistry::default();
		let first_id = Uuid::new_v4();
		let first = registry.register(first_id);
		let _second = registry.register(Uuid::new_v4());
		let superseded = first.await;

		assert!(matches!(superseded.error(), Some(Error::Superseded)));
		assert_eq!(superseded.correlation_id, Some(first_id));
	}

	#[test]
	fn results_without_a_waiter_are_kept_once() {
		let registry = CompletionRegistry::default();

		assert!(!registry.complete(AuthenticationResult::failed(Error::NoResumeState, None)));
		assert!(matches!(
			registry.take_interrupted().and_then(|r| r.error),
			Some(Error::NoResumeState)
		));
		assert!(registry.take_interrupted().is_none());
	}

	#[tokio::test]
	async fn uncorrelated_results_resolve_the_pending_waiter() {
		let registry = CompletionRegistry::default();
		let id = Uuid::new_v4();
		let pending = registry.register(id);

		assert!(registry.complete(AuthenticationResult::failed(Error::NoResumeState, None)));

		let result = pending.await;

		assert!(matches!(result.error(), Some(Error::NoResumeState)));
		assert_eq!(result.correlation_id, Some(id));
		assert!(!registry.has_pending());
		assert!(registry.take_interrupted().is_none());
	}

	#[test]
	fn dropped_waiters_fall_back_to_the_interrupted_slot() {
		let registry = CompletionRegistry::default();
		let id = Uuid::new_v4();

		drop(registry.register(id));

		assert!(!registry.complete(AuthenticationResult::failed(Error::HashMissing, Some(id))));
		assert!(registry.take_interrupted().is_some());
		assert!(!registry.has_pending());
	}
}
