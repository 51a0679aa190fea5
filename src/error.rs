//! Exchange-level error types shared across the request builder, response processor, and stores.

// self
use crate::{
	_prelude::*,
	auth::IdentifierError,
	crypto::{CryptoError, KeyError},
	ext::InvokeError,
	store::StoreError,
};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical error carried by failed [`AuthenticationResult`](crate::auth::AuthenticationResult)s.
///
/// Every variant is cloneable so a failed result can be handed to both the waiting caller and the
/// interrupted-result slot without losing detail.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure (resume slot, key file, or token cache).
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// Required request parameters are missing or malformed.
	#[error("Broker request is invalid: {reason}.")]
	InvalidRequest {
		/// Which precondition failed.
		reason: String,
	},
	/// The configured redirect URI is not owned by the calling application.
	#[error("Redirect URI `{redirect_uri}` is not a valid broker redirect URI for this application.")]
	InvalidRedirectUri {
		/// Redirect URI that failed validation.
		redirect_uri: String,
	},
	/// No broker key could be obtained or provisioned.
	#[error("Broker key is unavailable.")]
	KeyUnavailable(#[source] KeyError),
	/// The broker could not be launched or the install prompt failed.
	#[error("Broker application could not be reached.")]
	BrokerUnavailable(#[source] InvokeError),

	/// A broker response arrived but no resume state was pending.
	#[error("No pending broker request matches this response.")]
	NoResumeState,
	/// Persisted resume state has no redirect URI and cannot be interpreted.
	#[error("Persisted resume state is missing its redirect URI.")]
	MissingRedirectUri,
	/// Response URL does not belong to the pending request.
	#[error("Broker response does not match the pending request redirect URI `{expected}`.")]
	MismatchedResumeState {
		/// Redirect URI stored with the pending request.
		expected: String,
	},
	/// Encrypted response arrived without its integrity hash.
	#[error("Broker response is missing its integrity hash.")]
	HashMissing,
	/// The response declared a protocol version this client does not speak.
	#[error("Broker response uses unsupported protocol version `{version}`.")]
	UnsupportedProtocolVersion {
		/// Raw version value supplied by the broker.
		version: String,
	},
	/// Payload could not be decoded or decrypted.
	#[error("Broker response could not be decrypted.")]
	DecryptionFailed(#[source] CryptoError),
	/// Decrypted payload does not match the transmitted hash.
	#[error("Broker response hash does not match the decrypted payload.")]
	ResponseHashMismatch,
	/// The broker answered with an error envelope.
	#[error("Broker rejected the request: {description}.")]
	BrokerRejected {
		/// Broker-supplied error code, when present.
		code: Option<String>,
		/// Broker-supplied description.
		description: String,
	},
	/// A newer broker request replaced this one before a response arrived.
	#[error("Broker request was superseded by a newer request.")]
	Superseded,
	/// Unexpected failure while interpreting a verified payload.
	#[error("Unexpected internal error: {message}.")]
	UnexpectedInternal {
		/// Human-readable detail.
		message: String,
	},
}
impl Error {
	pub(crate) fn invalid_request(reason: impl Into<String>) -> Self {
		Self::InvalidRequest { reason: reason.into() }
	}

	pub(crate) fn internal(message: impl Into<String>) -> Self {
		Self::UnexpectedInternal { message: message.into() }
	}
}

/// Configuration and validation failures raised while assembling a client.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ConfigError {
	/// App identity declares no URL schemes, so no redirect URI can ever validate.
	#[error("App identity must declare at least one URL scheme.")]
	NoUrlSchemes,
	/// No broker application identifiers were configured.
	#[error("At least one broker application identifier is required.")]
	MissingBrokerAppId,
	/// Broker launch URL was not configured.
	#[error("Broker launch URL is required.")]
	MissingBrokerLaunchUrl,
	/// Client version string is empty.
	#[error("Client version cannot be empty.")]
	EmptyClientVersion,
	/// A configured identifier failed validation.
	#[error("Configured identifier is invalid.")]
	InvalidIdentifier(#[from] IdentifierError),
	/// Configuration document could not be parsed.
	#[error("Configuration is malformed at `{path}`: {message}.")]
	Parse {
		/// Path to the offending field.
		path: String,
		/// Parser message.
		message: String,
	},
}
impl From<serde_path_to_error::Error<serde_json::Error>> for ConfigError {
	fn from(e: serde_path_to_error::Error<serde_json::Error>) -> Self {
		Self::Parse { path: e.path().to_string(), message: e.inner().to_string() }
	}
}
