// self
use crate::{
	_prelude::*,
	config::{AppIdentity, BrokerConfig, CacheWritePolicy, default_client_version},
	error::ConfigError,
};

/// Builder for [`BrokerConfig`] values.
#[derive(Debug)]
pub struct BrokerConfigBuilder {
	/// Calling application identity.
	pub app: AppIdentity,
	/// Version string reported to the broker.
	pub client_version: String,
	/// Accepted broker source application identifiers.
	pub broker_app_ids: Vec<String>,
	/// Broker launch URL.
	pub broker_launch_url: Option<Url>,
	/// Cache-write failure policy.
	pub cache_write_policy: CacheWritePolicy,
}
impl BrokerConfigBuilder {
	/// Creates a builder seeded with the provided identity and the crate version.
	pub fn new(app: AppIdentity) -> Self {
		Self {
			app,
			client_version: default_client_version(),
			broker_app_ids: Vec::new(),
			broker_launch_url: None,
			cache_write_policy: CacheWritePolicy::default(),
		}
	}

	/// Overrides the reported client version.
	pub fn client_version(mut self, version: impl Into<String>) -> Self {
		self.client_version = version.into();

		self
	}

	/// Accepts responses from an additional broker application.
	pub fn broker_app_id(mut self, id: impl Into<String>) -> Self {
		self.broker_app_ids.push(id.into());

		self
	}

	/// Sets the broker launch URL.
	pub fn broker_launch_url(mut self, url: Url) -> Self {
		self.broker_launch_url = Some(url);

		self
	}

	/// Overrides the cache-write failure policy.
	pub fn cache_write_policy(mut self, policy: CacheWritePolicy) -> Self {
		self.cache_write_policy = policy;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<BrokerConfig, ConfigError> {
		let broker_launch_url = self.broker_launch_url.ok_or(ConfigError::MissingBrokerLaunchUrl)?;
		let config = BrokerConfig {
			app: self.app,
			client_version: self.client_version,
			broker_app_ids: self.broker_app_ids,
			broker_launch_url,
			cache_write_policy: self.cache_write_policy,
		};

		config.validate()?;

		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::BundleId;

	fn app(schemes: &[&str]) -> AppIdentity {
		AppIdentity::new(
			BundleId::new("com.contoso.app").expect("Bundle identifier fixture should be valid."),
			schemes.iter().copied(),
		)
	}

	fn launch_url() -> Url {
		Url::parse("broker://handle").expect("Launch URL fixture should parse.")
	}

	#[test]
	fn builder_requires_launch_url_and_broker_ids() {
		assert_eq!(
			BrokerConfig::builder(app(&["x-app"])).broker_app_id("com.broker").build(),
			Err(ConfigError::MissingBrokerLaunchUrl)
		);
		assert_eq!(
			BrokerConfig::builder(app(&["x-app"])).broker_launch_url(launch_url()).build(),
			Err(ConfigError::MissingBrokerAppId)
		);
	}

	#[test]
	fn builder_rejects_identities_without_schemes_and_empty_versions() {
		assert_eq!(
			BrokerConfig::builder(app(&[]))
				.broker_app_id("com.broker")
				.broker_launch_url(launch_url())
				.build(),
			Err(ConfigError::NoUrlSchemes)
		);
		assert_eq!(
			BrokerConfig::builder(app(&["x-app"]))
				.broker_app_id("com.broker")
				.broker_launch_url(launch_url())
				.client_version(" ")
				.build(),
			Err(ConfigError::EmptyClientVersion)
		);
	}

	#[test]
	fn builder_applies_overrides() {
		let config = BrokerConfig::builder(app(&["x-app"]))
			.broker_app_id("com.broker")
			.broker_launch_url(launch_url())
			.client_version("9.9.9")
			.cache_write_policy(CacheWritePolicy::Strict)
			.build()
			.expect("Complete builder should produce a configuration.");

		assert_eq!(config.client_version, "9.9.9");
		assert_eq!(config.cache_write_policy, CacheWritePolicy::Strict);
	}
}
