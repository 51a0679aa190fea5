//! Terminal artifact of a broker exchange.

// self
use crate::{_prelude::*, auth::TokenCacheItem};

/// Whether the exchange produced a usable token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthenticationStatus {
	/// A verified token is available.
	Succeeded,
	/// The exchange failed; see [`AuthenticationResult::error`].
	Failed,
}

/// Outcome delivered to the caller that started a broker request.
#[derive(Clone, Debug)]
pub struct AuthenticationResult {
	/// Overall status.
	pub status: AuthenticationStatus,
	/// Token issued by the broker, present on success.
	pub token_cache_item: Option<TokenCacheItem>,
	/// Failure detail, present on failure.
	pub error: Option<Error>,
	/// Correlation id of the request, when known.
	pub correlation_id: Option<Uuid>,
}
impl AuthenticationResult {
	/// Builds a successful result.
	pub fn succeeded(item: TokenCacheItem, correlation_id: Option<Uuid>) -> Self {
		Self {
			status: AuthenticationStatus::Succeeded,
			token_cache_item: Some(item),
			error: None,
			correlation_id,
		}
	}

	/// Builds a failed result.
	pub fn failed(error: impl Into<Error>, correlation_id: Option<Uuid>) -> Self {
		Self {
			status: AuthenticationStatus::Failed,
			token_cache_item: None,
			error: Some(error.into()),
			correlation_id,
		}
	}

	/// Returns `true` when a verified token is available.
	pub fn is_success(&self) -> bool {
		matches!(self.status, AuthenticationStatus::Succeeded)
	}

	/// Access token of a successful result.
	pub fn access_token(&self) -> Option<&str> {
		self.token_cache_item.as_ref().map(|item| item.access_token.expose())
	}

	/// Failure detail of a failed result.
	pub fn error(&self) -> Option<&Error> {
		self.error.as_ref()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn failed_results_carry_error_and_correlation() {
		let correlation_id = Uuid::new_v4();
		let result = AuthenticationResult::failed(Error::NoResumeState, Some(correlation_id));

		assert!(!result.is_success());
		assert!(result.access_token().is_none());
		assert!(matches!(result.error(), Some(Error::NoResumeState)));
		assert_eq!(result.correlation_id, Some(correlation_id));
	}

	#[test]
	fn succeeded_results_expose_the_access_token() {
		let item = TokenCacheItem::builder("https://login.example.com/common", "res", "client")
			.access_token("access")
			.expires_in(Duration::hours(1))
			.build()
			.expect("Token cache item fixture should build.");
		let result = AuthenticationResult::succeeded(item, None);

		assert!(result.is_success());
		assert_eq!(result.access_token(), Some("access"));
		assert!(result.error().is_none());
	}
}
