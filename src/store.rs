//! Token cache contracts and built-in cache implementations fed by verified broker results.

pub mod file;
pub mod memory;

pub use file::{FileCacheResolver, FileTokenCache};
pub use memory::{MemoryCacheResolver, MemoryTokenCache};

// self
use crate::{
	_prelude::*,
	auth::{AuthenticationResult, TokenCacheItem, TokenSecret},
};

/// Boxed future returned by [`TokenCache`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract implemented by token caches.
pub trait TokenCache
where
	Self: Send + Sync,
{
	/// Writes the token carried by a successful result, replacing any item under the same key.
	///
	/// `refresh_token` overrides the item's own refresh token when supplied. Failed results are
	/// ignored.
	fn update_cache_to_result<'a>(
		&'a self,
		result: &'a AuthenticationResult,
		item: &'a TokenCacheItem,
		refresh_token: Option<&'a TokenSecret>,
		correlation_id: Option<Uuid>,
	) -> StoreFuture<'a, ()>;

	/// Fetches the item stored under the key, if present.
	fn fetch<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, Option<TokenCacheItem>>;

	/// Removes and returns the item stored under the key.
	fn remove<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, Option<TokenCacheItem>>;

	/// Returns every cached item.
	fn items(&self) -> StoreFuture<'_, Vec<TokenCacheItem>>;
}

/// Resolves the token cache that backs a shared cache group.
pub trait TokenCacheResolver
where
	Self: Send + Sync,
{
	/// Opens (or returns the already open) cache for `group`.
	fn resolve(&self, group: &str) -> Result<Arc<dyn TokenCache>, StoreError>;
}

/// Error type produced by storage backends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Unique key identifying a cached token.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
	/// Authority, lowercased.
	pub authority: String,
	/// Resource the token targets.
	pub resource: String,
	/// Client identifier.
	pub client_id: String,
	/// Unique user id, when the broker identified the user.
	pub user_id: Option<String>,
}
impl CacheKey {
	/// Builds a key from its parts.
	pub fn new(
		authority: &str,
		resource: impl Into<String>,
		client_id: impl Into<String>,
		user_id: Option<String>,
	) -> Self {
		Self {
			authority: authority.trim_end_matches('/').to_ascii_lowercase(),
			resource: resource.into(),
			client_id: client_id.into(),
			user_id,
		}
	}

	/// Derives the key an item is stored under.
	pub fn for_item(item: &TokenCacheItem) -> Self {
		Self::new(
			&item.authority,
			item.resource.clone(),
			item.client_id.clone(),
			item.user_id().map(str::to_owned),
		)
	}
}

/// Applies the refresh-token override and returns the item to persist, or `None` for failures.
pub(crate) fn item_to_persist(
	result: &AuthenticationResult,
	item: &TokenCacheItem,
	refresh_token: Option<&TokenSecret>,
) -> Option<TokenCacheItem> {
	if !result.is_success() {
		return None;
	}

	let mut item = item.clone();

	if let Some(refresh) = refresh_token {
		item.refresh_token = Some(refresh.clone());
	}

	Some(item)
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;
	use crate::error::Error;

	fn item(user: Option<&str>) -> TokenCacheItem {
		let mut builder =
			TokenCacheItem::builder("https://Login.Example.com/Common/", "resource", "client")
				.access_token("access")
				.expires_in(Duration::hours(1));

		if let Some(user) = user {
			builder = builder.user_information(crate::auth::UserInformation::with_user_id(user));
		}

		builder.build().expect("Token cache item fixture should build.")
	}

	#[test]
	fn store_error_converts_into_exchange_error_with_source() {
		let store_error = StoreError::Backend { message: "disk unavailable".into() };
		let error: Error = store_error.clone().into();

		assert!(matches!(error, Error::Storage(_)));
		assert!(error.to_string().contains("disk unavailable"));

		let source = StdError::source(&error)
			.expect("Exchange error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn cache_key_normalizes_authority_and_tracks_user() {
		let anonymous = CacheKey::for_item(&item(None));
		let named = CacheKey::for_item(&item(Some("user-1")));

		assert_eq!(anonymous.authority, "https://login.example.com/common");
		assert_eq!(anonymous.user_id, None);
		assert_eq!(named.user_id.as_deref(), Some("user-1"));
		assert_ne!(anonymous, named);
	}

	#[test]
	fn only_successful_results_are_persisted() {
		let item = item(None);
		let success = AuthenticationResult::succeeded(item.clone(), None);
		let failure = AuthenticationResult::failed(Error::ResponseHashMismatch, None);
		let refresh = TokenSecret::new("override");
		let persisted = item_to_persist(&success, &item, Some(&refresh))
			.expect("Successful results should be persisted.");

		assert_eq!(persisted.refresh_token.as_ref().map(TokenSecret::expose), Some("override"));
		assert!(item_to_persist(&failure, &item, None).is_none());
	}
}
