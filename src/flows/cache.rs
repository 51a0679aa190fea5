//! Writes verified results into the shared token cache of their group.

// self
use crate::{
	_prelude::*,
	auth::{AuthenticationResult, TokenCacheItem},
	config::CacheWritePolicy,
	flows::BrokerClient,
	obs::{self, FlowKind},
	resume::ResumeState,
	store::StoreError,
};

impl BrokerClient {
	/// Persists a verified success into the cache group recorded with the request.
	///
	/// Results without a cache group pass through. A failed write is logged and suppressed under
	/// [`CacheWritePolicy::BestEffort`] and turns the result into `Failed(Storage)` under
	/// [`CacheWritePolicy::Strict`].
	pub(crate) async fn on_verified_success(
		&self,
		result: AuthenticationResult,
		resume: &ResumeState,
	) -> AuthenticationResult {
		let Some(group) = resume.keychain_group.as_deref() else {
			return result;
		};
		let Some(item) = result.token_cache_item.as_ref() else {
			return result;
		};
		let Err(err) = self.write_result(group, &result, item).await else {
			obs::record_stage(FlowKind::ProcessResponse, "cached");

			return result;
		};

		match self.config.cache_write_policy {
			CacheWritePolicy::BestEffort => {
				obs::record_suppressed(FlowKind::ProcessResponse, &Error::from(err));
				obs::record_cache_write_suppressed();
				self.metrics.record_suppressed();

				result
			},
			CacheWritePolicy::Strict => AuthenticationResult::failed(err, result.correlation_id),
		}
	}

	async fn write_result(
		&self,
		group: &str,
		result: &AuthenticationResult,
		item: &TokenCacheItem,
	) -> Result<(), StoreError> {
		let cache = self.cache_resolver.resolve(group)?;

		cache
			.update_cache_to_result(result, item, item.refresh_token.as_ref(), result.correlation_id)
			.await
	}
}
