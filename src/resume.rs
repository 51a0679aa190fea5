//! Resume state persisted across the broker round trip.
//!
//! Exactly one broker exchange may be outstanding per process. [`ResumeStateStore::save`] is
//! last-writer-wins and [`ResumeStateStore::take`] is a destructive read, so a response can be
//! interpreted against a given state at most once.

pub mod file;
pub mod memory;

pub use file::FileResumeStore;
pub use memory::MemoryResumeStore;

// self
use crate::{_prelude::*, store::StoreError};

/// Well-known key of the resume slot inside persistent settings storage.
pub const RESUME_STATE_KEY: &str = "broker_exchange.resume_state";

/// Correlation data needed to validate and interpret a broker response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeState {
	/// Authority the request was made against.
	pub authority: String,
	/// Resource the request asked for.
	pub resource: String,
	/// Client identifier of the calling application.
	pub client_id: String,
	/// Redirect URI the broker must answer on. Empty means the state is corrupt.
	#[serde(default)]
	pub redirect_uri: String,
	/// Correlation id of the request.
	pub correlation_id: Uuid,
	/// Shared cache group the result should be written into.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub keychain_group: Option<String>,
}
impl ResumeState {
	/// Returns `true` when the response URL starts with the stored redirect URI, ignoring ASCII
	/// case.
	pub fn matches_response(&self, response_url: &str) -> bool {
		let prefix = self.redirect_uri.as_bytes();

		!prefix.is_empty()
			&& response_url
				.as_bytes()
				.get(..prefix.len())
				.is_some_and(|head| head.eq_ignore_ascii_case(prefix))
	}
}

/// Single-slot persistence contract for [`ResumeState`].
pub trait ResumeStateStore
where
	Self: Send + Sync,
{
	/// Stores `state`, silently replacing any unconsumed state.
	fn save(&self, state: ResumeState) -> Result<(), StoreError>;

	/// Returns the pending state and clears the slot in the same step.
	///
	/// The slot is cleared even when the stored value cannot be decoded.
	fn take(&self) -> Result<Option<ResumeState>, StoreError>;

	/// Returns the pending state without clearing it.
	fn peek(&self) -> Result<Option<ResumeState>, StoreError>;
}

#[cfg(test)]
pub(crate) fn sample_state(redirect_uri: &str) -> ResumeState {
	ResumeState {
		authority: "https://login.example.com/common".into(),
		resource: "https://graph.example.com".into(),
		client_id: "client-1".into(),
		redirect_uri: redirect_uri.into(),
		correlation_id: Uuid::new_v4(),
		keychain_group: None,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn prefix_match_ignores_ascii_case() {
		let state = sample_state("x-app://com.contoso.app");

		assert!(state.matches_response("x-app://com.contoso.app?response=abc"));
		assert!(state.matches_response("X-APP://COM.CONTOSO.APP?hash=1"));
		assert!(!state.matches_response("x-app://com.evil.app?response=abc"));
		assert!(!state.matches_response("x-app://com"));
	}

	#[test]
	fn empty_redirect_uri_never_matches() {
		assert!(!sample_state("").matches_response("anything"));
	}

	#[test]
	fn missing_redirect_uri_deserializes_as_empty() {
		let payload = format!(
			r#"{{"authority":"a","resource":"r","client_id":"c","correlation_id":"{}"}}"#,
			Uuid::new_v4()
		);
		let state: ResumeState =
			serde_json::from_str(&payload).expect("Resume state without redirect should parse.");

		assert!(state.redirect_uri.is_empty());
		assert!(state.keychain_group.is_none());
	}
}
