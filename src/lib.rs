//! Broker-mediated token exchange client: delegate interactive sign-in to a trusted broker
//! application, resume across process lifetimes, and verify encrypted broker responses before they
//! reach your token cache.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod ext;
pub mod flows;
pub mod obs;
mod redirect;
pub mod resume;
pub mod store;
pub mod wire;

#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and fixtures for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{AuthenticationResult, BundleId, TokenCacheItem, TokenSecret},
		config::{AppIdentity, BrokerConfig, CacheWritePolicy},
		crypto::{self, BrokerKey, ProtocolVersion, StaticKeyProvider},
		ext::{BrokerInvoker, InvokeError},
		flows::{BrokerClient, BrokerRequest, BrokerRequestParameters},
		resume::MemoryResumeStore,
		store::{
			CacheKey, MemoryTokenCache, StoreError, StoreFuture, TokenCache, TokenCacheResolver,
		},
		wire,
	};

	/// Bundle identifier of the fixture application.
	pub const TEST_BUNDLE_ID: &str = "com.contoso.app";
	/// Redirect URI owned by the fixture application.
	pub const TEST_REDIRECT_URI: &str = "x-contoso://com.contoso.app";
	/// Source application id of the fixture broker.
	pub const TEST_BROKER_APP_ID: &str = "com.broker.authenticator";
	/// Shared cache group used by fixture requests.
	pub const TEST_CACHE_GROUP: &str = "com.contoso.shared";

	/// Application identity that owns [`TEST_REDIRECT_URI`].
	pub fn test_app_identity() -> AppIdentity {
		AppIdentity::new(
			BundleId::new(TEST_BUNDLE_ID).expect("Fixture bundle identifier should be valid."),
			["x-contoso"],
		)
	}

	/// Client configuration for the fixture application.
	pub fn test_config(policy: CacheWritePolicy) -> BrokerConfig {
		BrokerConfig::builder(test_app_identity())
			.broker_app_id(TEST_BROKER_APP_ID)
			.broker_launch_url(
				Url::parse("msauth://broker/token").expect("Fixture launch URL should parse."),
			)
			.cache_write_policy(policy)
			.build()
			.expect("Fixture configuration should build.")
	}

	/// Request for a token written into [`TEST_CACHE_GROUP`].
	pub fn test_request() -> BrokerRequest {
		BrokerRequest::new(
			"https://login.example.com/common",
			"https://graph.example.com",
			"client-1",
			TEST_REDIRECT_URI,
		)
		.with_cache_group(TEST_CACHE_GROUP)
	}

	/// Response URL carrying `payload` sealed for `version` with a matching hash.
	pub fn sealed_response_url(key: &BrokerKey, payload: &str, version: ProtocolVersion) -> String {
		let sealed =
			version.encrypt(key, payload.as_bytes()).expect("Sealing the fixture should work.");

		format!(
			"{TEST_REDIRECT_URI}/?{}={}&{}={}&{}={}",
			wire::RESPONSE,
			crypto::encode_payload(&sealed),
			wire::HASH,
			crypto::thumbprint(payload.as_bytes()),
			wire::MSG_PROTOCOL_VER,
			version.as_u8(),
		)
	}

	/// Invoker that records every launch instead of opening another application.
	#[derive(Debug, Default)]
	pub struct RecordingInvoker {
		missing: bool,
		fail: bool,
		launches: Mutex<Vec<Url>>,
		prompts: Mutex<Vec<Url>>,
	}
	impl RecordingInvoker {
		/// Invoker whose launches are all refused.
		pub fn failing() -> Self {
			Self { fail: true, ..Default::default() }
		}

		/// Invoker that reports the broker as not installed.
		pub fn without_broker() -> Self {
			Self { missing: true, ..Default::default() }
		}

		/// Launch URLs passed to [`BrokerInvoker::invoke_broker`].
		pub fn launches(&self) -> Vec<Url> {
			self.launches.lock().clone()
		}

		/// Launch URLs passed to [`BrokerInvoker::prompt_broker_install`].
		pub fn prompts(&self) -> Vec<Url> {
			self.prompts.lock().clone()
		}

		fn record(&self, log: &Mutex<Vec<Url>>, url: &Url) -> Result<(), InvokeError> {
			if self.fail {
				return Err(InvokeError::Launch { message: "launch refused".into() });
			}

			log.lock().push(url.clone());

			Ok(())
		}
	}
	impl BrokerInvoker for RecordingInvoker {
		fn is_broker_installed(&self) -> bool {
			!self.missing
		}

		fn invoke_broker(&self, url: &Url, _: &BrokerRequestParameters) -> Result<(), InvokeError> {
			self.record(&self.launches, url)
		}

		fn prompt_broker_install(
			&self,
			url: &Url,
			_: &BrokerRequestParameters,
		) -> Result<(), InvokeError> {
			self.record(&self.prompts, url)
		}
	}

	/// Token cache that logs the correlation id of every write.
	#[derive(Debug, Default)]
	pub struct RecordingCache {
		inner: MemoryTokenCache,
		writes: Mutex<Vec<Option<Uuid>>>,
		fail_writes: bool,
	}
	impl RecordingCache {
		/// Correlation ids of the writes received so far.
		pub fn writes(&self) -> Vec<Option<Uuid>> {
			self.writes.lock().clone()
		}

		/// Number of items held by the backing cache.
		pub fn len(&self) -> usize {
			self.inner.len()
		}

		/// Returns `true` when the backing cache is empty.
		pub fn is_empty(&self) -> bool {
			self.inner.is_empty()
		}
	}
	impl TokenCache for RecordingCache {
		fn update_cache_to_result<'a>(
			&'a self,
			result: &'a AuthenticationResult,
			item: &'a TokenCacheItem,
			refresh_token: Option<&'a TokenSecret>,
			correlation_id: Option<Uuid>,
		) -> StoreFuture<'a, ()> {
			self.writes.lock().push(correlation_id);

			if self.fail_writes {
				return Box::pin(async {
					Err(StoreError::Backend { message: "cache is read-only".into() })
				});
			}

			self.inner.update_cache_to_result(result, item, refresh_token, correlation_id)
		}

		fn fetch<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, Option<TokenCacheItem>> {
			self.inner.fetch(key)
		}

		fn remove<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, Option<TokenCacheItem>> {
			self.inner.remove(key)
		}

		fn items(&self) -> StoreFuture<'_, Vec<TokenCacheItem>> {
			self.inner.items()
		}
	}

	/// Resolver handing out one [`RecordingCache`] per group.
	#[derive(Debug, Default)]
	pub struct RecordingCacheResolver {
		caches: Mutex<HashMap<String, Arc<RecordingCache>>>,
		fail_writes: bool,
	}
	impl RecordingCacheResolver {
		/// Resolver whose caches reject every write.
		pub fn failing() -> Self {
			Self { fail_writes: true, ..Default::default() }
		}

		/// Cache of `group`, if it was resolved.
		pub fn cache(&self, group: &str) -> Option<Arc<RecordingCache>> {
			self.caches.lock().get(group).cloned()
		}
	}
	impl TokenCacheResolver for RecordingCacheResolver {
		fn resolve(&self, group: &str) -> Result<Arc<dyn TokenCache>, StoreError> {
			let cache = self
				.caches
				.lock()
				.entry(group.to_owned())
				.or_insert_with(|| {
					Arc::new(RecordingCache { fail_writes: self.fail_writes, ..Default::default() })
				})
				.clone();

			Ok(cache)
		}
	}

	/// Client wired to in-memory collaborators plus handles to inspect them.
	#[derive(Debug)]
	pub struct TestClient {
		/// Client under test.
		pub client: BrokerClient,
		/// Key shared with the simulated broker.
		pub key: BrokerKey,
		/// Resume slot.
		pub resume: Arc<MemoryResumeStore>,
		/// Launch recorder.
		pub invoker: Arc<RecordingInvoker>,
		/// Cache recorder.
		pub caches: Arc<RecordingCacheResolver>,
	}

	/// Builds a [`TestClient`] around the provided invoker and cache resolver.
	pub fn build_test_client(
		policy: CacheWritePolicy,
		invoker: RecordingInvoker,
		caches: RecordingCacheResolver,
	) -> TestClient {
		let key = BrokerKey::generate();
		let resume = Arc::new(MemoryResumeStore::default());
		let invoker = Arc::new(invoker);
		let caches = Arc::new(caches);
		let client = BrokerClient::new(
			test_config(policy),
			resume.clone(),
			Arc::new(StaticKeyProvider::new(key.clone())),
			caches.clone(),
			invoker.clone(),
		);

		TestClient { client, key, resume, invoker, caches }
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		path::{Path, PathBuf},
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;
	pub use uuid::Uuid;

	pub use crate::error::{Error, Result};
}

pub use url;
pub use uuid;
#[cfg(test)] use color_eyre as _;
