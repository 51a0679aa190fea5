//! Client configuration: the calling application's identity and broker coordinates.

/// Builder API for assembling [`BrokerConfig`] values.
pub mod builder;

pub use builder::*;

// self
use crate::{
	_prelude::*,
	auth::{BundleId, TeamId},
	error::ConfigError,
};

/// Identity of the calling application, supplied by the host instead of introspected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIdentity {
	/// Bundle identifier; broker redirect URIs must use it as their host.
	pub bundle_id: BundleId,
	/// URL schemes the application registered with the platform.
	pub url_schemes: Vec<String>,
	/// Signing team prefix applied to shared cache groups.
	#[serde(default)]
	pub team_id: Option<TeamId>,
}
impl AppIdentity {
	/// Creates an identity with the provided bundle identifier and URL schemes.
	pub fn new<I, S>(bundle_id: BundleId, url_schemes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let url_schemes = url_schemes.into_iter().map(Into::into).collect();

		Self { bundle_id, url_schemes, team_id: None }
	}

	/// Sets the signing team identifier.
	pub fn with_team_id(mut self, team_id: TeamId) -> Self {
		self.team_id = Some(team_id);

		self
	}

	/// Removes a leading `"<team id>."` from a cache group.
	pub fn strip_team_prefix<'a>(&self, group: &'a str) -> &'a str {
		self.team_id
			.as_ref()
			.and_then(|team| group.strip_prefix(&**team))
			.and_then(|rest| rest.strip_prefix('.'))
			.filter(|rest| !rest.is_empty())
			.unwrap_or(group)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.url_schemes.iter().all(|scheme| scheme.trim().is_empty()) {
			return Err(ConfigError::NoUrlSchemes);
		}

		Ok(())
	}
}

/// Behavior when writing a verified result into the token cache fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheWritePolicy {
	/// Log the failure and still deliver the successful result.
	#[default]
	BestEffort,
	/// Turn the result into `Failed(Storage)`.
	Strict,
}

/// Validated client configuration consumed by [`BrokerClient`](crate::flows::BrokerClient).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
	/// Calling application identity.
	pub app: AppIdentity,
	/// Version string reported to the broker.
	#[serde(default = "default_client_version")]
	pub client_version: String,
	/// Source application identifiers accepted as the broker.
	pub broker_app_ids: Vec<String>,
	/// Base URL used to launch the broker; request parameters are appended as its query.
	pub broker_launch_url: Url,
	/// Cache-write failure policy.
	#[serde(default)]
	pub cache_write_policy: CacheWritePolicy,
}
impl BrokerConfig {
	/// Creates a new builder for the provided application identity.
	pub fn builder(app: AppIdentity) -> BrokerConfigBuilder {
		BrokerConfigBuilder::new(app)
	}

	/// Parses and validates a JSON configuration document.
	pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_slice(bytes);
		let config: Self = serde_path_to_error::deserialize(&mut de)?;

		config.validate()?;

		Ok(config)
	}

	/// Returns `true` when `source_application` is a configured broker.
	pub fn is_broker_app(&self, source_application: &str) -> bool {
		self.broker_app_ids.iter().any(|id| id == source_application)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		self.app.validate()?;

		if self.client_version.trim().is_empty() {
			return Err(ConfigError::EmptyClientVersion);
		}
		if self.broker_app_ids.iter().all(|id| id.trim().is_empty()) {
			return Err(ConfigError::MissingBrokerAppId);
		}

		Ok(())
	}
}

fn default_client_version() -> String {
	env!("CARGO_PKG_VERSION").into()
}
