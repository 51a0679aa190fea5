//! Ownership checks for broker redirect URIs.

// self
use crate::{_prelude::*, config::AppIdentity};

impl AppIdentity {
	/// Returns `true` when `candidate` is a redirect URI this application owns.
	///
	/// The URI must be absolute, its scheme must be one of the declared URL schemes (compared
	/// case-insensitively) and its host must equal the bundle identifier.
	pub fn is_valid_broker_redirect_uri(&self, candidate: &str) -> bool {
		let Ok(uri) = Url::parse(candidate.trim()) else {
			return false;
		};

		uri.host_str().is_some_and(|host| host == &*self.bundle_id)
			&& self.url_schemes.iter().any(|scheme| scheme.eq_ignore_ascii_case(uri.scheme()))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::BundleId;

	fn app() -> AppIdentity {
		AppIdentity::new(
			BundleId::new("com.contoso.app").expect("Bundle identifier fixture should be valid."),
			["x-Contoso-App", "msauth"],
		)
	}

	#[test]
	fn accepts_declared_scheme_with_bundle_host() {
		assert!(app().is_valid_broker_redirect_uri("x-contoso-app://com.contoso.app"));
		assert!(app().is_valid_broker_redirect_uri("MSAUTH://com.contoso.app/path?x=1"));
	}

	#[test]
	fn rejects_scheme_less_candidates() {
		assert!(!app().is_valid_broker_redirect_uri("com.contoso.app"));
		assert!(!app().is_valid_broker_redirect_uri("//com.contoso.app/path"));
		assert!(!app().is_valid_broker_redirect_uri(""));
	}

	#[test]
	fn rejects_foreign_hosts_even_with_declared_scheme() {
		assert!(!app().is_valid_broker_redirect_uri("msauth://com.evil.app"));
		assert!(!app().is_valid_broker_redirect_uri("msauth:com.contoso.app"));
	}

	#[test]
	fn rejects_undeclared_schemes() {
		assert!(!app().is_valid_broker_redirect_uri("https://com.contoso.app"));
	}
}
