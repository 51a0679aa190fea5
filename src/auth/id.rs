//! Application identifiers checked against redirect URIs and used to scope shared caches.

// std
use std::ops::Deref;
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal, $allowed:expr) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
				Self::try_from(value.into())
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate($kind, &value, $allowed)?;

				Ok(Self(value))
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 255;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier.
		kind: &'static str,
	},
	/// The identifier contains a character its kind does not allow.
	#[error("{kind} identifier cannot contain `{character}`.")]
	InvalidCharacter {
		/// Kind of identifier.
		kind: &'static str,
		/// First rejected character.
		character: char,
	},
	/// The identifier exceeded the allowed length.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier.
		kind: &'static str,
		/// Maximum permitted length.
		max: usize,
	},
}

def_id! {
	BundleId,
	"Reverse-DNS bundle identifier of the calling application; the host of its redirect URIs.",
	"Bundle",
	|c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '-')
}
def_id! {
	TeamId,
	"Signing team identifier that prefixes shared cache groups.",
	"Team",
	|c: char| c.is_ascii_alphanumeric()
}
def_id! {
	CacheGroup,
	"Shared token cache group; also names the group's snapshot file.",
	"CacheGroup",
	|c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')
}

fn validate(
	kind: &'static str,
	view: &str,
	allowed: impl Fn(char) -> bool,
) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if let Some(character) = view.chars().find(|&c| !allowed(c)) {
		return Err(IdentifierError::InvalidCharacter { kind, character });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn each_kind_has_its_own_alphabet() {
		assert_eq!(
			&*BundleId::new("com.contoso-app.ios").expect("Bundle fixture should be valid."),
			"com.contoso-app.ios"
		);
		assert_eq!(
			BundleId::new("com.contoso app"),
			Err(IdentifierError::InvalidCharacter { kind: "Bundle", character: ' ' })
		);
		assert!(TeamId::new("TEAM.1").is_err());
		assert!(CacheGroup::new("com.contoso_shared").is_ok());
		assert!(CacheGroup::new("../escape").is_err());
		assert_eq!(TeamId::new(""), Err(IdentifierError::Empty { kind: "Team" }));
	}

	#[test]
	fn deserialization_validates() {
		let team: TeamId =
			serde_json::from_str("\"ABCDE12345\"").expect("Team identifier should deserialize.");

		assert_eq!(team.to_string(), "ABCDE12345");
		assert!(serde_json::from_str::<BundleId>("\"com/contoso\"").is_err());
	}

	#[test]
	fn length_limit_is_inclusive() {
		CacheGroup::new("a".repeat(IDENTIFIER_MAX_LEN)).expect("Exact length should succeed.");

		assert!(matches!(
			CacheGroup::new("a".repeat(IDENTIFIER_MAX_LEN + 1)),
			Err(IdentifierError::TooLong { .. })
		));
	}
}
