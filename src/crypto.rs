//! Broker key provisioning, versioned payload encryption, and response thumbprints.

pub mod key;
pub mod protocol;

pub use key::*;
pub use protocol::*;

// std
use std::ops::Deref;
// crates.io
use base64::{
	Engine as _,
	engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD},
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;
// self
use crate::_prelude::*;

/// Failures raised while decoding, decrypting, or keying a broker payload.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CryptoError {
	/// The envelope carried no encrypted payload.
	#[error("Encrypted payload is missing.")]
	MissingPayload,
	/// Payload is not valid base64.
	#[error("Encrypted payload is not valid base64: {message}.")]
	Base64 {
		/// Decoder message.
		message: String,
	},
	/// Payload is shorter than a nonce plus authentication tag.
	#[error("Encrypted payload is too short ({len} bytes).")]
	PayloadTooShort {
		/// Observed payload length.
		len: usize,
	},
	/// Key material has the wrong length.
	#[error("Broker key must be {expected} bytes, got {len}.")]
	InvalidKeyLength {
		/// Required length.
		expected: usize,
		/// Observed length.
		len: usize,
	},
	/// Authenticated decryption or encryption failed.
	#[error("Authenticated encryption failed for protocol version {version}.")]
	Aead {
		/// Protocol version in use.
		version: u8,
	},
}

/// Plaintext recovered from a broker envelope; wiped when dropped.
pub struct DecryptedPayload(Zeroizing<Vec<u8>>);
impl DecryptedPayload {
	pub(crate) fn new(bytes: Vec<u8>) -> Self {
		Self(Zeroizing::new(bytes))
	}

	/// Borrowed plaintext bytes.
	pub fn as_bytes(&self) -> &[u8] {
		&self.0
	}
}
impl Deref for DecryptedPayload {
	type Target = [u8];

	fn deref(&self) -> &Self::Target {
		self.as_bytes()
	}
}
impl Debug for DecryptedPayload {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "DecryptedPayload({} bytes)", self.0.len())
	}
}

/// Upper-case hex SHA-256 thumbprint of `bytes`.
pub fn thumbprint(bytes: &[u8]) -> String {
	hex::encode_upper(Sha256::digest(bytes))
}

/// Compares the thumbprint of `plaintext` with `expected`, ignoring ASCII case.
pub fn verify_thumbprint(plaintext: &[u8], expected: &str) -> bool {
	let actual = thumbprint(plaintext);
	let expected = expected.trim().to_ascii_uppercase();

	actual.len() == expected.len() && bool::from(actual.as_bytes().ct_eq(expected.as_bytes()))
}

/// Encodes sealed bytes for the `response` wire field (base64url, no padding).
pub fn encode_payload(sealed: &[u8]) -> String {
	URL_SAFE_NO_PAD.encode(sealed)
}

/// Decodes the `response` wire field.
///
/// Accepts both base64 alphabets with or without padding. A `+` turned into a space by form
/// decoding is restored first.
pub fn decode_payload(encoded: &str) -> Result<Vec<u8>, CryptoError> {
	let restored = encoded.trim_matches(['\r', '\n', '\t']).replace(' ', "+");
	let trimmed = restored.trim_end_matches('=');

	if trimmed.is_empty() {
		return Err(CryptoError::MissingPayload);
	}

	let decoded = if trimmed.contains(['-', '_']) {
		URL_SAFE_NO_PAD.decode(trimmed)
	} else {
		STANDARD_NO_PAD.decode(trimmed)
	};

	decoded.map_err(|e| CryptoError::Base64 { message: e.to_string() })
}
