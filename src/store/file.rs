//! File-backed [`TokenCache`] plus the atomic snapshot helpers shared by every file backend.

// std
use std::{
	fs::{self, File},
	io::Write,
};
// self
use crate::{
	_prelude::*,
	auth::{AuthenticationResult, CacheGroup, TokenCacheItem, TokenSecret},
	store::{self, CacheKey, StoreError, StoreFuture, TokenCache, TokenCacheResolver},
};

/// Persists token cache items to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileTokenCache {
	path: PathBuf,
	inner: Arc<RwLock<HashMap<CacheKey, TokenCacheItem>>>,
}
impl FileTokenCache {
	/// Opens (or creates) a cache at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		ensure_parent_exists(&path)?;

		let snapshot = match read_if_present(&path)? {
			Some(bytes) => {
				let entries: Vec<(CacheKey, TokenCacheItem)> = serde_json::from_slice(&bytes)
					.map_err(|e| StoreError::Serialization {
						message: format!("Failed to parse {}: {e}", path.display()),
					})?;

				entries.into_iter().collect()
			},
			None => HashMap::new(),
		};

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Location of the backing snapshot.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn persist_locked(&self, contents: &HashMap<CacheKey, TokenCacheItem>) -> Result<(), StoreError> {
		let snapshot: Vec<_> = contents.iter().collect();
		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize token cache snapshot: {e}"),
			})?;

		write_atomically(&self.path, &serialized)
	}
}
impl TokenCache for FileTokenCache {
	fn update_cache_to_result<'a>(
		&'a self,
		result: &'a AuthenticationResult,
		item: &'a TokenCacheItem,
		refresh_token: Option<&'a TokenSecret>,
		_correlation_id: Option<Uuid>,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let Some(item) = store::item_to_persist(result, item, refresh_token) else {
				return Ok(());
			};
			let mut guard = self.inner.write();

			guard.insert(CacheKey::for_item(&item), item);
			self.persist_locked(&guard)
		})
	}

	fn fetch<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, Option<TokenCacheItem>> {
		Box::pin(async move { Ok(self.inner.read().get(key).cloned()) })
	}

	fn remove<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, Option<TokenCacheItem>> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let removed = guard.remove(key);

			if removed.is_some() {
				self.persist_locked(&guard)?;
			}

			Ok(removed)
		})
	}

	fn items(&self) -> StoreFuture<'_, Vec<TokenCacheItem>> {
		Box::pin(async move { Ok(self.inner.read().values().cloned().collect()) })
	}
}

/// Resolver that keeps one JSON snapshot per cache group under a root directory.
#[derive(Debug)]
pub struct FileCacheResolver {
	root: PathBuf,
	open: RwLock<HashMap<String, Arc<FileTokenCache>>>,
}
impl FileCacheResolver {
	/// Creates a resolver rooted at `root`; snapshots are created lazily.
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into(), open: Default::default() }
	}

	/// Snapshot path used for `group`.
	pub fn path_for(&self, group: &str) -> Result<PathBuf, StoreError> {
		let group = CacheGroup::new(group)
			.map_err(|e| StoreError::Backend { message: format!("Invalid cache group: {e}") })?;

		if group.starts_with('.') {
			return Err(StoreError::Backend {
				message: format!("Cache group `{group}` cannot be used as a file name"),
			});
		}

		Ok(self.root.join(format!("{group}.json")))
	}
}
impl TokenCacheResolver for FileCacheResolver {
	fn resolve(&self, group: &str) -> Result<Arc<dyn TokenCache>, StoreError> {
		if let Some(cache) = self.open.read().get(group) {
			return Ok(cache.clone());
		}

		let mut open = self.open.write();
		let cache = match open.get(group) {
			Some(cache) => cache.clone(),
			None => {
				let cache = Arc::new(FileTokenCache::open(self.path_for(group)?)?);

				open.insert(group.to_owned(), cache.clone());

				cache
			},
		};

		Ok(cache)
	}
}

/// Reads `path`, treating a missing or empty file as absent.
pub(crate) fn read_if_present(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
	if !path.exists() {
		return Ok(None);
	}

	let bytes = fs::read(path).map_err(|e| StoreError::Backend {
		message: format!("Failed to read {}: {e}", path.display()),
	})?;

	Ok(if bytes.is_empty() { None } else { Some(bytes) })
}

pub(crate) fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
			message: format!("Failed to create store directory {}: {e}", parent.display()),
		})?;
	}

	Ok(())
}

/// Replaces `path` with `contents` through a synced temp file and a rename.
pub(crate) fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
	ensure_parent_exists(path)?;

	let mut tmp_path = path.to_path_buf();

	tmp_path.set_extension("tmp");

	{
		let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
			message: format!("Failed to create {}: {e}", tmp_path.display()),
		})?;

		file.write_all(contents).map_err(|e| StoreError::Backend {
			message: format!("Failed to write {}: {e}", tmp_path.display()),
		})?;
		file.sync_all().map_err(|e| StoreError::Backend {
			message: format!("Failed to sync {}: {e}", tmp_path.display()),
		})?;
	}

	fs::rename(&tmp_path, path).map_err(|e| StoreError::Backend {
		message: format!("Failed to replace {}: {e}", path.display()),
	})
}

#[cfg(test)]
pub(crate) fn temp_path(label: &str) -> PathBuf {
	let unique = format!(
		"broker_exchange_{label}_{}_{}.json",
		std::process::id(),
		OffsetDateTime::now_utc().unix_timestamp_nanos(),
	);

	std::env::temp_dir().join(unique)
}

#[cfg(test)]
mod tests {
	// crates.io
	use tokio::runtime::Runtime;
	// self
	use super::*;

	fn build_item() -> TokenCacheItem {
		TokenCacheItem::builder("https://login.example.com/common", "resource", "client")
			.access_token("access-token")
			.refresh_token("refresh-token")
			.expires_in(Duration::hours(1))
			.build()
			.expect("Failed to build file cache test item.")
	}

	#[test]
	fn save_and_reload_round_trip() {
		let path = temp_path("file_cache");
		let cache = FileTokenCache::open(&path).expect("Failed to open file cache snapshot.");
		let item = build_item();
		let result = AuthenticationResult::succeeded(item.clone(), None);
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file cache test.");

		rt.block_on(cache.update_cache_to_result(&result, &item, None, None))
			.expect("Failed to save fixture item to file cache.");
		drop(cache);

		let reopened = FileTokenCache::open(&path).expect("Failed to reopen file cache snapshot.");
		let fetched = rt
			.block_on(reopened.fetch(&CacheKey::for_item(&item)))
			.expect("Failed to fetch fixture item from file cache.")
			.expect("File cache lost item after reopen.");

		assert_eq!(fetched.access_token.expose(), "access-token");
		assert_eq!(fetched.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh-token"));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file cache snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn resolver_rejects_path_like_groups() {
		let resolver = FileCacheResolver::new(std::env::temp_dir());

		assert!(resolver.path_for("../escape").is_err());
		assert!(resolver.path_for(".hidden").is_err());
		assert!(resolver.path_for("a\\b").is_err());
		assert!(
			resolver
				.path_for("com.contoso.shared")
				.expect("Plain groups should map to a file.")
				.ends_with("com.contoso.shared.json")
		);
	}

	#[test]
	fn resolver_reuses_open_caches() {
		let root = temp_path("file_resolver");
		let resolver = FileCacheResolver::new(&root);
		let first = resolver.resolve("group-a").expect("First resolve should open the cache.");
		let second = resolver.resolve("group-a").expect("Second resolve should reuse the cache.");

		assert!(Arc::ptr_eq(&first, &second));

		let _ = fs::remove_dir_all(&root);
	}
}
