//! Token cache items produced from verified broker payloads, plus their builder.

// self
use crate::{
	_prelude::*,
	auth::{UserInformation, token::secret::TokenSecret},
};

const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Lifecycle status for a cached token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token is currently valid.
	Active,
	/// Token reached its expiry instant.
	Expired,
}

/// Errors produced by [`TokenCacheItemBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenCacheItemBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_on or expires_in.")]
	MissingExpiry,
	/// Issued when a relative expiry does not fit in the supported date range.
	#[error("Expiry is out of the supported date range.")]
	ExpiryOutOfRange,
	/// Issued when the authority, resource, or client id is empty.
	#[error("Token cache item requires a non-empty {field}.")]
	MissingField {
		/// Name of the empty field.
		field: &'static str,
	},
}

/// Token record handed to the token cache and to the caller on success.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenCacheItem {
	/// Authority that issued the token.
	pub authority: String,
	/// Resource the access token is scoped to.
	pub resource: String,
	/// OAuth client identifier the token was issued to.
	pub client_id: String,
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token secret, if the broker returned one.
	pub refresh_token: Option<TokenSecret>,
	/// Token type reported by the broker (defaults to `Bearer`).
	pub token_type: String,
	/// Expiry instant.
	pub expires_on: OffsetDateTime,
	/// Identity of the signed-in user, when the broker supplied one.
	pub user_information: Option<UserInformation>,
	/// Family-of-client-ids marker, when the refresh token is shareable.
	pub family_id: Option<String>,
}
impl TokenCacheItem {
	/// Returns a builder seeded with the token's authority, resource, and client id.
	pub fn builder(
		authority: impl Into<String>,
		resource: impl Into<String>,
		client_id: impl Into<String>,
	) -> TokenCacheItemBuilder {
		TokenCacheItemBuilder::new(authority.into(), resource.into(), client_id.into())
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> TokenStatus {
		if instant >= self.expires_on { TokenStatus::Expired } else { TokenStatus::Active }
	}

	/// Returns `true` if the token is expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), TokenStatus::Expired)
	}

	/// Returns `true` if the token is expired relative to the current clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Unique user identifier, when known.
	pub fn user_id(&self) -> Option<&str> {
		self.user_information.as_ref().map(|user| user.user_id.as_str())
	}
}
impl Debug for TokenCacheItem {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCacheItem")
			.field("authority", &self.authority)
			.field("resource", &self.resource)
			.field("client_id", &self.client_id)
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("token_type", &self.token_type)
			.field("expires_on", &self.expires_on)
			.field("user_information", &self.user_information)
			.field("family_id", &self.family_id)
			.finish()
	}
}

/// Builder for [`TokenCacheItem`].
#[derive(Clone, Debug)]
pub struct TokenCacheItemBuilder {
	authority: String,
	resource: String,
	client_id: String,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	token_type: Option<String>,
	issued_at: Option<OffsetDateTime>,
	expires_on: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
	user_information: Option<UserInformation>,
	family_id: Option<String>,
}
impl TokenCacheItemBuilder {
	fn new(authority: String, resource: String, client_id: String) -> Self {
		Self {
			authority,
			resource,
			client_id,
			access_token: None,
			refresh_token: None,
			token_type: None,
			issued_at: None,
			expires_on: None,
			expires_in: None,
			user_information: None,
			family_id: None,
		}
	}

	/// Replaces the authority.
	pub fn authority(mut self, authority: impl Into<String>) -> Self {
		self.authority = authority.into();

		self
	}

	/// Replaces the resource.
	pub fn resource(mut self, resource: impl Into<String>) -> Self {
		self.resource = resource.into();

		self
	}

	/// Replaces the client id.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = client_id.into();

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Overrides the token type.
	pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = Some(token_type.into());

		self
	}

	/// Sets the instant relative expiries are computed from (defaults to now).
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_on(mut self, instant: OffsetDateTime) -> Self {
		self.expires_on = Some(instant);

		self
	}

	/// Sets a relative expiry duration.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Attaches user information.
	pub fn user_information(mut self, user: UserInformation) -> Self {
		self.user_information = Some(user);

		self
	}

	/// Marks the token as belonging to a client family.
	pub fn family_id(mut self, family_id: impl Into<String>) -> Self {
		self.family_id = Some(family_id.into());

		self
	}

	/// Consumes the builder and produces a [`TokenCacheItem`].
	pub fn build(self) -> Result<TokenCacheItem, TokenCacheItemBuilderError> {
		for (field, value) in [
			("authority", &self.authority),
			("resource", &self.resource),
			("client_id", &self.client_id),
		] {
			if value.is_empty() {
				return Err(TokenCacheItemBuilderError::MissingField { field });
			}
		}

		let access_token =
			self.access_token.ok_or(TokenCacheItemBuilderError::MissingAccessToken)?;
		let expires_on = match (self.expires_on, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => self
				.issued_at
				.unwrap_or_else(OffsetDateTime::now_utc)
				.checked_add(delta)
				.ok_or(TokenCacheItemBuilderError::ExpiryOutOfRange)?,
			(None, None) => return Err(TokenCacheItemBuilderError::MissingExpiry),
		};

		Ok(TokenCacheItem {
			authority: self.authority,
			resource: self.resource,
			client_id: self.client_id,
			access_token,
			refresh_token: self.refresh_token,
			token_type: self.token_type.unwrap_or_else(|| DEFAULT_TOKEN_TYPE.into()),
			expires_on,
			user_information: self.user_information,
			family_id: self.family_id,
		})
	}
}
