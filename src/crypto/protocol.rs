//! Closed set of broker message protocol versions and their payload ciphers.
//!
//! Sealed payloads are laid out as `nonce (12 bytes) || ciphertext || tag (16 bytes)`.
//!
//! - [`ProtocolVersion::V1`] seals with AES-256-GCM under the raw broker key.
//! - [`ProtocolVersion::V2`] seals with AES-256-GCM under `SHA-256(V2_KEY_LABEL || key)` and binds
//!   the version label as associated data, so a V2 payload never opens as V1 or vice versa.

// crates.io
use aes_gcm::{
	Aes256Gcm, Nonce,
	aead::{Aead, KeyInit, Payload},
};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;
// self
use crate::{
	_prelude::*,
	crypto::{BrokerKey, CryptoError, DecryptedPayload},
};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const V2_KEY_LABEL: &[u8] = b"broker-exchange/msg-protocol-v2";
const V2_ASSOCIATED_DATA: &[u8] = b"msg_protocol_ver=2";

/// Message protocol versions understood by this client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProtocolVersion {
	/// Original encoding.
	V1,
	/// Derived-key encoding with version binding.
	V2,
}
impl ProtocolVersion {
	/// Highest version advertised to the broker via `max_protocol_ver`.
	pub const MAX: Self = Self::V2;

	/// Numeric wire value.
	pub const fn as_u8(self) -> u8 {
		match self {
			Self::V1 => 1,
			Self::V2 => 2,
		}
	}

	/// Resolves the `msg_protocol_ver` field; an absent field means version 1.
	pub fn from_wire(value: Option<&str>) -> Result<Self> {
		match value.map(str::trim) {
			None | Some("1") => Ok(Self::V1),
			Some("2") => Ok(Self::V2),
			Some(other) => Err(Error::UnsupportedProtocolVersion { version: other.to_owned() }),
		}
	}

	/// Seals `plaintext` for this version with a fresh random nonce.
	pub fn encrypt(self, key: &BrokerKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
		match self {
			Self::V1 => seal(self, key.expose(), &[], plaintext),
			Self::V2 => seal(self, derive_v2_key(key).as_slice(), V2_ASSOCIATED_DATA, plaintext),
		}
	}

	/// Opens a sealed payload produced for this version.
	pub fn decrypt(self, key: &BrokerKey, sealed: &[u8]) -> Result<DecryptedPayload, CryptoError> {
		match self {
			Self::V1 => decrypt_v1(key, sealed),
			Self::V2 => decrypt_v2(key, sealed),
		}
	}
}
impl Display for ProtocolVersion {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}", self.as_u8())
	}
}

fn decrypt_v1(key: &BrokerKey, sealed: &[u8]) -> Result<DecryptedPayload, CryptoError> {
	open(ProtocolVersion::V1, key.expose(), &[], sealed)
}

fn decrypt_v2(key: &BrokerKey, sealed: &[u8]) -> Result<DecryptedPayload, CryptoError> {
	let subkey = derive_v2_key(key);

	open(ProtocolVersion::V2, subkey.as_slice(), V2_ASSOCIATED_DATA, sealed)
}

fn derive_v2_key(key: &BrokerKey) -> Zeroizing<[u8; BrokerKey::LEN]> {
	let mut hasher = Sha256::new();

	hasher.update(V2_KEY_LABEL);
	hasher.update(key.expose());

	Zeroizing::new(hasher.finalize().into())
}

fn cipher(key: &[u8]) -> Result<Aes256Gcm, CryptoError> {
	Aes256Gcm::new_from_slice(key)
		.map_err(|_| CryptoError::InvalidKeyLength { expected: BrokerKey::LEN, len: key.len() })
}

fn seal(
	version: ProtocolVersion,
	key: &[u8],
	aad: &[u8],
	plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
	let nonce: [u8; NONCE_LEN] = rand::random();
	let ciphertext = cipher(key)?
		.encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad })
		.map_err(|_| CryptoError::Aead { version: version.as_u8() })?;
	let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());

	sealed.extend_from_slice(&nonce);
	sealed.extend_from_slice(&ciphertext);

	Ok(sealed)
}

fn open(
	version: ProtocolVersion,
	key: &[u8],
	aad: &[u8],
	sealed: &[u8],
) -> Result<DecryptedPayload, CryptoError> {
	if sealed.len() < NONCE_LEN + TAG_LEN {
		return Err(CryptoError::PayloadTooShort { len: sealed.len() });
	}

	let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
	let plaintext = cipher(key)?
		.decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
		.map_err(|_| CryptoError::Aead { version: version.as_u8() })?;

	Ok(DecryptedPayload::new(plaintext))
}
