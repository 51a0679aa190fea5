//! Symmetric broker key and the providers that obtain or provision it.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use zeroize::{Zeroize, ZeroizeOnDrop};
// self
use crate::{
	_prelude::*,
	crypto::CryptoError,
	store::{StoreError, file},
};

const KEY_LEN: usize = 32;

/// 256-bit key shared with the broker to protect response payloads.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct BrokerKey([u8; KEY_LEN]);
impl BrokerKey {
	/// Key length in bytes.
	pub const LEN: usize = KEY_LEN;

	/// Generates a fresh random key.
	pub fn generate() -> Self {
		Self(rand::random())
	}

	/// Wraps raw key bytes.
	pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
		let bytes: [u8; Self::LEN] = bytes
			.try_into()
			.map_err(|_| CryptoError::InvalidKeyLength { expected: Self::LEN, len: bytes.len() })?;

		Ok(Self(bytes))
	}

	/// Decodes the `broker_key` wire encoding.
	pub fn from_wire(encoded: &str) -> Result<Self, CryptoError> {
		let bytes = zeroize::Zeroizing::new(
			URL_SAFE_NO_PAD
				.decode(encoded.trim().trim_end_matches('='))
				.map_err(|e| CryptoError::Base64 { message: e.to_string() })?,
		);

		Self::from_bytes(&bytes)
	}

	/// Encodes the key for the `broker_key` wire field (base64url, no padding).
	pub fn to_wire(&self) -> String {
		URL_SAFE_NO_PAD.encode(&self.0)
	}

	/// Raw key bytes. Callers must not log or persist them in the clear.
	pub fn expose(&self) -> &[u8; Self::LEN] {
		&self.0
	}
}
impl Debug for BrokerKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("BrokerKey").field(&"<redacted>").finish()
	}
}

/// Failures raised while obtaining the broker key.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum KeyError {
	/// Key storage could not be read or written.
	#[error("{0}")]
	Storage(#[from] StoreError),
	/// Stored key material is malformed.
	#[error("Stored broker key is malformed.")]
	Malformed(#[source] CryptoError),
	/// No key exists and this provider cannot provision one.
	#[error("No broker key has been provisioned.")]
	NotProvisioned,
}

/// Source of the symmetric key shared with the broker.
pub trait BrokerKeyProvider
where
	Self: Send + Sync,
{
	/// Returns the current key, provisioning one first if the provider supports it.
	fn broker_key(&self) -> Result<BrokerKey, KeyError>;
}

/// Provider for a key that was provisioned out of band.
#[derive(Clone, Debug)]
pub struct StaticKeyProvider(BrokerKey);
impl StaticKeyProvider {
	/// Wraps a provisioned key.
	pub fn new(key: BrokerKey) -> Self {
		Self(key)
	}
}
impl BrokerKeyProvider for StaticKeyProvider {
	fn broker_key(&self) -> Result<BrokerKey, KeyError> {
		Ok(self.0.clone())
	}
}

/// Generates a key on first use and keeps it for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryKeyProvider(RwLock<Option<BrokerKey>>);
impl BrokerKeyProvider for MemoryKeyProvider {
	fn broker_key(&self) -> Result<BrokerKey, KeyError> {
		if let Some(key) = self.0.read().as_ref() {
			return Ok(key.clone());
		}

		Ok(self.0.write().get_or_insert_with(BrokerKey::generate).clone())
	}
}

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct StoredKey {
	broker_key: String,
}

/// Persists the key in a JSON file, generating it the first time it is requested.
#[derive(Debug)]
pub struct FileKeyProvider {
	path: PathBuf,
	lock: Mutex<()>,
}
impl FileKeyProvider {
	/// Creates a provider backed by the key file at `path`.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into(), lock: Mutex::new(()) }
	}

	fn load(&self) -> Result<Option<BrokerKey>, KeyError> {
		let Some(bytes) = file::read_if_present(&self.path)? else {
			return Ok(None);
		};
		let bytes = zeroize::Zeroizing::new(bytes);
		let stored: StoredKey =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", self.path.display()),
			})?;

		BrokerKey::from_wire(&stored.broker_key).map(Some).map_err(KeyError::Malformed)
	}

	fn provision(&self) -> Result<BrokerKey, KeyError> {
		let key = BrokerKey::generate();
		let stored = StoredKey { broker_key: key.to_wire() };
		let serialized = zeroize::Zeroizing::new(serde_json::to_vec(&stored).map_err(|e| {
			StoreError::Serialization { message: format!("Failed to encode broker key: {e}") }
		})?);

		file::write_atomically(&self.path, &serialized)?;

		Ok(key)
	}
}
impl BrokerKeyProvider for FileKeyProvider {
	fn broker_key(&self) -> Result<BrokerKey, KeyError> {
		let _guard = self.lock.lock();

		match self.load()? {
			Some(key) => Ok(key),
			None => self.provision(),
		}
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::fs;
	// self
	use super::*;
	use crate::store::file::temp_path;

	#[test]
	fn wire_encoding_round_trips_and_validates_length() {
		let key = BrokerKey::generate();

		assert_eq!(BrokerKey::from_wire(&key.to_wire()), Ok(key));
		assert_eq!(
			BrokerKey::from_bytes(&[0_u8; 16]),
			Err(CryptoError::InvalidKeyLength { expected: 32, len: 16 })
		);
	}

	#[test]
	fn debug_redacts_key_material() {
		assert_eq!(format!("{:?}", BrokerKey::generate()), "BrokerKey(\"<redacted>\")");
	}

	#[test]
	fn memory_provider_is_stable() {
		let provider = MemoryKeyProvider::default();
		let first = provider.broker_key().expect("First key request should provision a key.");
		let second = provider.broker_key().expect("Second key request should reuse the key.");

		assert_eq!(first, second);
	}

	#[test]
	fn file_provider_persists_across_instances() {
		let path = temp_path("broker_key");
		let first = FileKeyProvider::new(&path)
			.broker_key()
			.expect("File provider should provision a key.");
		let second = FileKeyProvider::new(&path)
			.broker_key()
			.expect("File provider should reload the provisioned key.");

		assert_eq!(first, second);

		let _ = fs::remove_file(&path);
	}

	#[test]
	fn file_provider_reports_malformed_keys() {
		let path = temp_path("broker_key_bad");

		fs::write(&path, br#"{"broker_key":"c2hvcnQ"}"#).expect("Seeding key file should succeed.");

		assert!(matches!(
			FileKeyProvider::new(&path).broker_key(),
			Err(KeyError::Malformed(CryptoError::InvalidKeyLength { .. }))
		));

		let _ = fs::remove_file(&path);
	}
}
