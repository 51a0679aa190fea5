//! Wire field names and query-string codecs shared by the request builder and response processor.

// crates.io
use url::form_urlencoded;
// self
use crate::_prelude::*;

/// Outbound field: authority the token is requested from.
pub const AUTHORITY: &str = "authority";
/// Outbound/payload field: resource the token is scoped to.
pub const RESOURCE: &str = "resource";
/// Outbound/payload field: client identifier.
pub const CLIENT_ID: &str = "client_id";
/// Outbound field: redirect URI the broker answers on.
pub const REDIRECT_URI: &str = "redirect_uri";
/// Outbound field: kind of the user identifier hint.
pub const USERNAME_TYPE: &str = "username_type";
/// Outbound field: user identifier hint.
pub const USERNAME: &str = "username";
/// Outbound field: `YES` forces an interactive prompt.
pub const FORCE: &str = "force";
/// Outbound/inbound/payload field: correlation id.
pub const CORRELATION_ID: &str = "correlation_id";
/// Outbound field: base64url broker key.
pub const BROKER_KEY: &str = "broker_key";
/// Outbound field: version of the calling client library.
pub const CLIENT_VERSION: &str = "client_version";
/// Outbound field: highest message protocol version understood by the client.
pub const MAX_PROTOCOL_VER: &str = "max_protocol_ver";
/// Outbound field: extra query parameters forwarded to the authority.
pub const EXTRA_QP: &str = "extra_qp";

/// Inbound/payload field: error description.
pub const ERROR_DESCRIPTION: &str = "error_description";
/// Inbound/payload field: error code.
pub const ERROR_CODE: &str = "error_code";
/// Inbound field: thumbprint of the decrypted payload.
pub const HASH: &str = "hash";
/// Inbound field: base64 encrypted payload.
pub const RESPONSE: &str = "response";
/// Inbound field: message protocol version of the payload.
pub const MSG_PROTOCOL_VER: &str = "msg_protocol_ver";

/// Payload field: access token.
pub const ACCESS_TOKEN: &str = "access_token";
/// Payload field: refresh token.
pub const REFRESH_TOKEN: &str = "refresh_token";
/// Payload field: token type.
pub const TOKEN_TYPE: &str = "token_type";
/// Payload field: absolute expiry in unix seconds.
pub const EXPIRES_ON: &str = "expires_on";
/// Payload field: relative expiry in seconds.
pub const EXPIRES_IN: &str = "expires_in";
/// Payload field: raw id token.
pub const ID_TOKEN: &str = "id_token";
/// Payload field: family (FOCI) identifier.
pub const FOCI: &str = "foci";
/// Payload field: user id used when no id token is returned.
pub const USER_ID: &str = "user_id";

const INBOUND_FIELDS: [&str; 4] = [ERROR_DESCRIPTION, ERROR_CODE, HASH, RESPONSE];
const NULL_PLACEHOLDERS: [&str; 2] = ["(null)", "null"];

/// Decoded query mapping; the first occurrence of a repeated field wins.
pub type Fields = BTreeMap<String, String>;

/// Decodes an `application/x-www-form-urlencoded` string.
pub fn decode_query(query: &str) -> Fields {
	let mut fields = Fields::new();

	for (name, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
		fields.entry(name.into_owned()).or_insert_with(|| value.into_owned());
	}

	fields
}

/// Encodes fields as a query string in key order.
pub fn encode_query<'a, I>(fields: I) -> String
where
	I: IntoIterator<Item = (&'a String, &'a String)>,
{
	let mut serializer = form_urlencoded::Serializer::new(String::new());

	for (name, value) in fields {
		serializer.append_pair(name, value);
	}

	serializer.finish()
}

/// Drops values the broker uses as null placeholders.
pub fn strip_null_placeholders(fields: &mut Fields) {
	fields.retain(|_, value| !NULL_PLACEHOLDERS.contains(&value.trim()));
}

/// Returns `true` when the URL carries at least one broker response field.
pub fn is_broker_response(url: &Url) -> bool {
	url.query_pairs().any(|(name, _)| INBOUND_FIELDS.contains(&&*name))
}

/// Decoded query of a broker response URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BrokerResponseEnvelope {
	/// The broker reported a failure in clear text.
	Error {
		/// Broker or authority error code.
		code: Option<String>,
		/// Human-readable description.
		description: String,
		/// Correlation id echoed by the broker.
		correlation_id: Option<String>,
	},
	/// The broker returned an encrypted payload.
	Encrypted {
		/// Base64 sealed payload.
		response: Option<String>,
		/// Thumbprint of the plaintext.
		hash: Option<String>,
		/// Raw `msg_protocol_ver` value.
		version: Option<String>,
	},
}
impl BrokerResponseEnvelope {
	/// Classifies decoded response fields; `error_description` selects the error shape.
	pub fn from_fields(mut fields: Fields) -> Self {
		strip_null_placeholders(&mut fields);

		match fields.remove(ERROR_DESCRIPTION) {
			Some(description) => Self::Error {
				code: fields.remove(ERROR_CODE),
				description,
				correlation_id: fields.remove(CORRELATION_ID),
			},
			None => Self::Encrypted {
				response: fields.remove(RESPONSE),
				hash: fields.remove(HASH),
				version: fields.remove(MSG_PROTOCOL_VER),
			},
		}
	}

	/// Parses the query component of a response URL.
	pub fn from_url(url: &Url) -> Self {
		Self::from_fields(decode_query(url.query().unwrap_or_default()))
	}
}
