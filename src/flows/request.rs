//! Outbound half of the exchange: request context, wire parameters, and dispatch.

// self
use crate::{
	_prelude::*,
	auth::AuthenticationResult,
	config::BrokerConfig,
	crypto::{BrokerKeyProvider, ProtocolVersion},
	flows::{BrokerClient, PendingResult},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	resume::ResumeState,
	wire,
};

/// Whether the broker should force an interactive prompt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromptBehavior {
	/// Let the broker decide.
	#[default]
	Auto,
	/// Always prompt for credentials.
	Always,
	/// Never prompt; fail if interaction is required.
	Never,
}

/// How the broker should treat a user identifier hint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserIdentifierType {
	/// The signed-in account must match the displayable id.
	RequiredDisplayableId,
	/// The displayable id only pre-fills the sign-in form.
	OptionalDisplayableId,
	/// Unique object identifier of the user.
	UniqueId,
}
impl UserIdentifierType {
	/// Wire label sent as `username_type`.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::RequiredDisplayableId => "RequiredDisplayableId",
			Self::OptionalDisplayableId => "OptionalDisplayableId",
			Self::UniqueId => "UniqueId",
		}
	}
}

/// User hint forwarded to the broker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentifier {
	/// Identifier value.
	pub id: String,
	/// Identifier kind.
	pub kind: UserIdentifierType,
}
impl UserIdentifier {
	/// Creates a hint of the provided kind.
	pub fn new(id: impl Into<String>, kind: UserIdentifierType) -> Self {
		Self { id: id.into(), kind }
	}
}

/// Context of a single token request delegated to the broker.
#[derive(Clone, Debug)]
pub struct BrokerRequest {
	/// Authority the token is requested from.
	pub authority: String,
	/// Resource the token is scoped to.
	pub resource: String,
	/// Client identifier of the calling application.
	pub client_id: String,
	/// Redirect URI the broker answers on.
	pub redirect_uri: String,
	/// Correlation id; generated when not supplied.
	pub correlation_id: Uuid,
	/// Optional user hint.
	pub user: Option<UserIdentifier>,
	/// Prompt behavior.
	pub prompt: PromptBehavior,
	/// Extra query parameters forwarded to the authority.
	pub extra_query_parameters: Option<String>,
	/// Shared cache group the result is written into.
	pub cache_group: Option<String>,
}
impl BrokerRequest {
	/// Creates a request with a fresh correlation id.
	pub fn new(
		authority: impl Into<String>,
		resource: impl Into<String>,
		client_id: impl Into<String>,
		redirect_uri: impl Into<String>,
	) -> Self {
		Self {
			authority: authority.into(),
			resource: resource.into(),
			client_id: client_id.into(),
			redirect_uri: redirect_uri.into(),
			correlation_id: Uuid::new_v4(),
			user: None,
			prompt: PromptBehavior::default(),
			extra_query_parameters: None,
			cache_group: None,
		}
	}

	/// Overrides the correlation id.
	pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
		self.correlation_id = correlation_id;

		self
	}

	/// Attaches a user hint.
	pub fn with_user(mut self, user: UserIdentifier) -> Self {
		self.user = Some(user);

		self
	}

	/// Overrides the prompt behavior.
	pub fn with_prompt(mut self, prompt: PromptBehavior) -> Self {
		self.prompt = prompt;

		self
	}

	/// Forwards extra query parameters to the authority.
	pub fn with_extra_query_parameters(mut self, extra: impl Into<String>) -> Self {
		self.extra_query_parameters = Some(extra.into());

		self
	}

	/// Writes the result into the provided shared cache group.
	pub fn with_cache_group(mut self, group: impl Into<String>) -> Self {
		self.cache_group = Some(group.into());

		self
	}

	fn validate(&self) -> Result<()> {
		for (field, value) in [
			(wire::AUTHORITY, &self.authority),
			(wire::RESOURCE, &self.resource),
			(wire::CLIENT_ID, &self.client_id),
		] {
			if value.trim().is_empty() {
				return Err(Error::invalid_request(format!("`{field}` is required")));
			}
		}
		if self.correlation_id.is_nil() {
			return Err(Error::invalid_request("correlation id must not be nil"));
		}

		Ok(())
	}
}

/// Ordered wire parameters handed to the broker.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BrokerRequestParameters(BTreeMap<String, String>);
impl BrokerRequestParameters {
	/// Value of a wire field.
	pub fn get(&self, field: &str) -> Option<&str> {
		self.0.get(field).map(String::as_str)
	}

	/// Iterates fields in key order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	/// Renders the parameters as a query string.
	pub fn to_query_string(&self) -> String {
		wire::encode_query(&self.0)
	}

	/// Appends the parameters to `base`, keeping any query it already carries.
	pub fn launch_url(&self, base: &Url) -> Url {
		let mut url = base.clone();

		url.query_pairs_mut().extend_pairs(self.iter());

		url
	}

	fn insert(&mut self, field: &str, value: impl Into<String>) {
		self.0.insert(field.to_owned(), value.into());
	}
}
impl Debug for BrokerRequestParameters {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_map()
			.entries(self.iter().map(|(k, v)| (k, if k == wire::BROKER_KEY { "<redacted>" } else { v })))
			.finish()
	}
}

/// Validates `request` and assembles its wire parameters and resume state.
///
/// Checks run in order: required fields, redirect URI ownership, then the broker key, so the key
/// provider is never consulted for a request that cannot be sent.
pub fn build_request(
	request: &BrokerRequest,
	config: &BrokerConfig,
	key_provider: &dyn BrokerKeyProvider,
) -> Result<(BrokerRequestParameters, ResumeState)> {
	request.validate()?;

	if !config.app.is_valid_broker_redirect_uri(&request.redirect_uri) {
		return Err(Error::InvalidRedirectUri { redirect_uri: request.redirect_uri.clone() });
	}

	let key = key_provider.broker_key().map_err(Error::KeyUnavailable)?;
	let mut params = BrokerRequestParameters::default();

	params.insert(wire::AUTHORITY, &request.authority);
	params.insert(wire::RESOURCE, &request.resource);
	params.insert(wire::CLIENT_ID, &request.client_id);
	params.insert(wire::REDIRECT_URI, &request.redirect_uri);
	params.insert(wire::CORRELATION_ID, request.correlation_id.to_string());
	params.insert(wire::BROKER_KEY, key.to_wire());
	params.insert(wire::CLIENT_VERSION, &config.client_version);
	params.insert(wire::MAX_PROTOCOL_VER, ProtocolVersion::MAX.to_string());
	params.insert(
		wire::FORCE,
		if matches!(request.prompt, PromptBehavior::Always) { "YES" } else { "NO" },
	);

	if let Some(user) = &request.user {
		params.insert(wire::USERNAME_TYPE, user.kind.as_str());
		params.insert(wire::USERNAME, &user.id);
	}
	if let Some(extra) = request.extra_query_parameters.as_deref().filter(|s| !s.is_empty()) {
		params.insert(wire::EXTRA_QP, extra);
	}

	let state = ResumeState {
		authority: request.authority.clone(),
		resource: request.resource.clone(),
		client_id: request.client_id.clone(),
		redirect_uri: request.redirect_uri.clone(),
		correlation_id: request.correlation_id,
		keychain_group: request
			.cache_group
			.as_deref()
			.filter(|group| !group.trim().is_empty())
			.map(|group| config.app.strip_team_prefix(group).to_owned()),
	};

	Ok((params, state))
}

impl BrokerClient {
	/// Delegates `request` to the broker and returns a future for its result.
	///
	/// Failures before delegation resolve the returned future immediately. A later request
	/// supersedes this one; the superseded future resolves to `Failed(Superseded)`.
	pub async fn acquire_token(&self, request: BrokerRequest) -> PendingResult {
		const KIND: FlowKind = FlowKind::BuildRequest;

		let span = FlowSpan::new(KIND, "acquire_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_attempt();

		span.instrument(async move {
			let _exchange = self.exchange_guard.lock().await;
			let correlation_id = request.correlation_id;

			match self.dispatch(&request) {
				Ok(pending) => {
					obs::record_flow_outcome(KIND, FlowOutcome::Success);

					pending
				},
				Err(err) => {
					let result = AuthenticationResult::failed(err, Some(correlation_id));

					self.record_outcome(KIND, &result);

					PendingResult::ready(result)
				},
			}
		})
		.await
	}

	fn dispatch(&self, request: &BrokerRequest) -> Result<PendingResult> {
		let (params, state) = build_request(request, &self.config, self.key_provider.as_ref())?;

		obs::record_stage(FlowKind::BuildRequest, "built");
		self.resume_store.save(state)?;

		let pending = self.completions.register(request.correlation_id);
		let launch_url = params.launch_url(&self.config.broker_launch_url);
		let launched = if self.invoker.is_broker_installed() {
			self.invoker.invoke_broker(&launch_url, &params)
		} else {
			self.invoker.prompt_broker_install(&launch_url, &params)
		};

		if let Err(err) = launched {
			self.completions.cancel(request.correlation_id);

			// A slot that cannot be cleared outranks the launch failure.
			if let Err(store_err) = self.resume_store.take() {
				obs::record_suppressed(FlowKind::BuildRequest, &Error::BrokerUnavailable(err));

				return Err(store_err.into());
			}

			return Err(Error::BrokerUnavailable(err));
		}

		obs::record_stage(FlowKind::BuildRequest, "delegated");

		Ok(pending)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		auth::BundleId,
		config::AppIdentity,
		crypto::{BrokerKey, KeyError, StaticKeyProvider},
	};

	struct NoKey;
	impl BrokerKeyProvider for NoKey {
		fn broker_key(&self) -> Result<BrokerKey, KeyError> {
			Err(KeyError::NotProvisioned)
		}
	}

	fn config() -> BrokerConfig {
		let app = AppIdentity::new(
			BundleId::new("com.contoso.app").expect("Bundle identifier fixture should be valid."),
			["x-app"],
		)
		.with_team_id(
			crate::auth::TeamId::new("TEAM1").expect("Team identifier fixture should be valid."),
		);

		BrokerConfig::builder(app)
			.broker_app_id("com.broker")
			.broker_launch_url(Url::parse("broker://handle").expect("Launch URL should parse."))
			.client_version("1.2.3")
			.build()
			.expect("Configuration fixture should build.")
	}

	fn request() -> BrokerRequest {
		BrokerRequest::new(
			"https://login.example.com/common",
			"https://graph.example.com",
			"client-1",
			"x-app://com.contoso.app",
		)
	}

	#[test]
	fn parameters_carry_every_outbound_field() {
		let key = BrokerKey::generate();
		let request = request()
			.with_prompt(PromptBehavior::Always)
			.with_user(UserIdentifier::new("user@contoso.com", UserIdentifierType::OptionalDisplayableId))
			.with_extra_query_parameters("slice=test")
			.with_cache_group("TEAM1.com.contoso.shared");
		let (params, state) =
			build_request(&request, &config(), &StaticKeyProvider::new(key.clone()))
				.expect("Valid request should build.");

		assert_eq!(params.get(wire::FORCE), Some("YES"));
		assert_eq!(params.get(wire::USERNAME_TYPE), Some("OptionalDisplayableId"));
		assert_eq!(params.get(wire::USERNAME), Some("user@contoso.com"));
		assert_eq!(params.get(wire::EXTRA_QP), Some("slice=test"));
		assert_eq!(params.get(wire::CLIENT_VERSION), Some("1.2.3"));
		assert_eq!(params.get(wire::MAX_PROTOCOL_VER), Some("2"));
		assert_eq!(params.get(wire::BROKER_KEY), Some(key.to_wire().as_str()));
		assert_eq!(state.keychain_group.as_deref(), Some("com.contoso.shared"));
		assert_eq!(state.correlation_id, request.correlation_id);
		assert!(!format!("{params:?}").contains(&key.to_wire()));
	}

	#[test]
	fn optional_fields_are_omitted_by_default() {
		let (params, state) = build_request(
			&request(),
			&config(),
			&StaticKeyProvider::new(BrokerKey::generate()),
		)
		.expect("Valid request should build.");

		assert_eq!(params.get(wire::FORCE), Some("NO"));
		assert_eq!(params.get(wire::USERNAME), None);
		assert_eq!(params.get(wire::EXTRA_QP), None);
		assert_eq!(state.keychain_group, None);
	}

	#[test]
	fn checks_run_before_the_key_is_requested() {
		let blank = BrokerRequest { client_id: " ".into(), ..request() };
		let nil = request().with_correlation_id(Uuid::nil());
		let foreign = BrokerRequest { redirect_uri: "x-app://com.evil.app".into(), ..request() };

		assert!(matches!(
			build_request(&blank, &config(), &NoKey),
			Err(Error::InvalidRequest { .. })
		));
		assert!(matches!(build_request(&nil, &config(), &NoKey), Err(Error::InvalidRequest { .. })));
		assert!(matches!(
			build_request(&foreign, &config(), &NoKey),
			Err(Error::InvalidRedirectUri { .. })
		));
		assert!(matches!(
			build_request(&request(), &config(), &NoKey),
			Err(Error::KeyUnavailable(KeyError::NotProvisioned))
		));
	}

	#[test]
	fn launch_url_appends_the_query() {
		let mut params = BrokerRequestParameters::default();

		params.insert(wire::AUTHORITY, "https://login.example.com/common");

		let base = Url::parse("broker://handle?v=1").expect("Base URL should parse.");
		let url = params.launch_url(&base);

		assert_eq!(
			url.as_str(),
			"broker://handle?v=1&authority=https%3A%2F%2Flogin.example.com%2Fcommon"
		);
		assert_eq!(
			params.to_query_string(),
			"authority=https%3A%2F%2Flogin.example.com%2Fcommon"
		);
	}
}
