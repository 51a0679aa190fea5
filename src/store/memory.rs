//! Thread-safe in-memory [`TokenCache`] and per-group resolver for tests and embedded use.

// self
use crate::{
	_prelude::*,
	auth::{AuthenticationResult, TokenCacheItem, TokenSecret},
	store::{self, CacheKey, StoreError, StoreFuture, TokenCache, TokenCacheResolver},
};

type CacheMap = Arc<RwLock<HashMap<CacheKey, TokenCacheItem>>>;

/// Storage backend that keeps token cache items in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryTokenCache(CacheMap);
impl MemoryTokenCache {
	fn save_now(map: CacheMap, item: TokenCacheItem) {
		let key = CacheKey::for_item(&item);

		map.write().insert(key, item);
	}

	/// Number of cached items.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is cached.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}
impl TokenCache for MemoryTokenCache {
	fn update_cache_to_result<'a>(
		&'a self,
		result: &'a AuthenticationResult,
		item: &'a TokenCacheItem,
		refresh_token: Option<&'a TokenSecret>,
		_correlation_id: Option<Uuid>,
	) -> StoreFuture<'a, ()> {
		let map = self.0.clone();
		let item = store::item_to_persist(result, item, refresh_token);

		Box::pin(async move {
			if let Some(item) = item {
				Self::save_now(map, item);
			}

			Ok(())
		})
	}

	fn fetch<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, Option<TokenCacheItem>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(key).cloned()) })
	}

	fn remove<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, Option<TokenCacheItem>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.write().remove(key)) })
	}

	fn items(&self) -> StoreFuture<'_, Vec<TokenCacheItem>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().values().cloned().collect()) })
	}
}

/// Resolver handing out one [`MemoryTokenCache`] per cache group.
#[derive(Clone, Debug, Default)]
pub struct MemoryCacheResolver(Arc<RwLock<HashMap<String, Arc<MemoryTokenCache>>>>);
impl MemoryCacheResolver {
	/// Returns the cache for `group` if it has been resolved before.
	pub fn cache(&self, group: &str) -> Option<Arc<MemoryTokenCache>> {
		self.0.read().get(group).cloned()
	}

	/// Names of every group resolved so far.
	pub fn groups(&self) -> Vec<String> {
		self.0.read().keys().cloned().collect()
	}
}
impl TokenCacheResolver for MemoryCacheResolver {
	fn resolve(&self, group: &str) -> Result<Arc<dyn TokenCache>, StoreError> {
		let cache: Arc<dyn TokenCache> =
			self.0.write().entry(group.to_owned()).or_default().clone();

		Ok(cache)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::UserInformation;

	fn item(access: &str) -> TokenCacheItem {
		TokenCacheItem::builder("https://login.example.com/common", "resource", "client")
			.access_token(access)
			.expires_in(Duration::hours(1))
			.user_information(UserInformation::with_user_id("user-1"))
			.build()
			.expect("Token cache item fixture should build.")
	}

	#[tokio::test]
	async fn update_replaces_items_under_the_same_key() {
		let cache = MemoryTokenCache::default();
		let first = item("access-1");
		let second = item("access-2");

		for item in [&first, &second] {
			let result = AuthenticationResult::succeeded(item.clone(), None);

			cache
				.update_cache_to_result(&result, item, None, None)
				.await
				.expect("Memory cache writes should succeed.");
		}

		let fetched = cache
			.fetch(&CacheKey::for_item(&first))
			.await
			.expect("Memory cache reads should succeed.")
			.expect("Cached item should be present.");

		assert_eq!(cache.len(), 1);
		assert_eq!(fetched.access_token.expose(), "access-2");
	}

	#[tokio::test]
	async fn resolver_scopes_caches_per_group() {
		let resolver = MemoryCacheResolver::default();
		let shared = resolver.resolve("com.contoso.shared").expect("Resolving should succeed.");
		let item = item("access");
		let result = AuthenticationResult::succeeded(item.clone(), None);

		shared
			.update_cache_to_result(&result, &item, None, None)
			.await
			.expect("Group cache writes should succeed.");

		let again = resolver.cache("com.contoso.shared").expect("Group cache should be retained.");

		assert_eq!(again.len(), 1);
		assert!(resolver.cache("com.contoso.other").is_none());
		assert_eq!(resolver.groups(), vec!["com.contoso.shared".to_owned()]);
	}
}
