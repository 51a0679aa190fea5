//! Signed-in user identity extracted from the broker's `id_token`.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::_prelude::*;

/// Errors raised while decoding an `id_token`.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum IdTokenError {
	/// Token is not a three-part JWT.
	#[error("ID token is not a compact JWT.")]
	Malformed,
	/// Payload segment is not valid base64url.
	#[error("ID token payload is not valid base64url.")]
	Encoding,
	/// Payload is not the expected JSON object.
	#[error("ID token claims are invalid: {message}.")]
	Claims {
		/// Parser message.
		message: String,
	},
	/// Neither `oid` nor `sub` was present.
	#[error("ID token carries no subject.")]
	MissingSubject,
}

#[derive(Deserialize)]
struct IdTokenClaims {
	oid: Option<String>,
	sub: Option<String>,
	upn: Option<String>,
	email: Option<String>,
	unique_name: Option<String>,
	given_name: Option<String>,
	family_name: Option<String>,
	tid: Option<String>,
	idp: Option<String>,
	iss: Option<String>,
}

/// Identity of the user the broker signed in.
///
/// Claims are read without signature verification; the broker payload is already integrity
/// checked by the time this is decoded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInformation {
	/// Stable unique identifier (`oid`, falling back to `sub`).
	pub user_id: String,
	/// Human-readable identifier (`upn`, `email`, or `unique_name`).
	pub displayable_id: Option<String>,
	/// Given name claim.
	pub given_name: Option<String>,
	/// Family name claim.
	pub family_name: Option<String>,
	/// Tenant identifier claim.
	pub tenant_id: Option<String>,
	/// Identity provider (`idp`, falling back to `iss`).
	pub identity_provider: Option<String>,
	/// Raw `id_token` the information was decoded from.
	pub raw_id_token: Option<String>,
}
impl UserInformation {
	/// Builds user information that only knows the unique user id.
	pub fn with_user_id(user_id: impl Into<String>) -> Self {
		Self {
			user_id: user_id.into(),
			displayable_id: None,
			given_name: None,
			family_name: None,
			tenant_id: None,
			identity_provider: None,
			raw_id_token: None,
		}
	}

	/// Decodes the claims segment of a compact JWT.
	pub fn from_id_token(id_token: &str) -> Result<Self, IdTokenError> {
		let mut segments = id_token.split('.');
		let (Some(_header), Some(payload), Some(_signature), None) =
			(segments.next(), segments.next(), segments.next(), segments.next())
		else {
			return Err(IdTokenError::Malformed);
		};
		let bytes = URL_SAFE_NO_PAD
			.decode(payload.trim_end_matches('='))
			.map_err(|_| IdTokenError::Encoding)?;
		let claims: IdTokenClaims = serde_json::from_slice(&bytes)
			.map_err(|e| IdTokenError::Claims { message: e.to_string() })?;
		let user_id = claims.oid.or(claims.sub).ok_or(IdTokenError::MissingSubject)?;

		Ok(Self {
			user_id,
			displayable_id: claims.upn.or(claims.email).or(claims.unique_name),
			given_name: claims.given_name,
			family_name: claims.family_name,
			tenant_id: claims.tid,
			identity_provider: claims.idp.or(claims.iss),
			raw_id_token: Some(id_token.to_owned()),
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn jwt(claims: &str) -> String {
		format!("eyJhbGciOiJub25lIn0.{}.", URL_SAFE_NO_PAD.encode(claims))
	}

	#[test]
	fn decodes_preferred_claims() {
		let token = jwt(
			r#"{"oid":"oid-1","sub":"sub-1","upn":"ada@contoso.com","email":"a@b.c","given_name":"Ada","family_name":"Lovelace","tid":"tenant-1","iss":"https://sts.example.com/"}"#,
		);
		let user = UserInformation::from_id_token(&token).expect("ID token fixture should decode.");

		assert_eq!(user.user_id, "oid-1");
		assert_eq!(user.displayable_id.as_deref(), Some("ada@contoso.com"));
		assert_eq!(user.tenant_id.as_deref(), Some("tenant-1"));
		assert_eq!(user.identity_provider.as_deref(), Some("https://sts.example.com/"));
		assert_eq!(user.raw_id_token.as_deref(), Some(token.as_str()));
	}

	#[test]
	fn falls_back_to_subject_and_email() {
		let user = UserInformation::from_id_token(&jwt(r#"{"sub":"sub-9","email":"x@y.z"}"#))
			.expect("Subject-only ID token should decode.");

		assert_eq!(user.user_id, "sub-9");
		assert_eq!(user.displayable_id.as_deref(), Some("x@y.z"));
	}

	#[test]
	fn rejects_malformed_tokens() {
		assert_eq!(UserInformation::from_id_token("abc"), Err(IdTokenError::Malformed));
		assert_eq!(UserInformation::from_id_token("a.b.c.d"), Err(IdTokenError::Malformed));
		assert_eq!(UserInformation::from_id_token("a.!!!.c"), Err(IdTokenError::Encoding));
		assert_eq!(
			UserInformation::from_id_token(&jwt(r#"{"upn":"nobody"}"#)),
			Err(IdTokenError::MissingSubject)
		);
	}
}
