//! Inbound half of the exchange: the response state machine.
//!
//! ```text
//! AwaitingResume -> Validated -> Decrypted -> HashVerified -> Decoded -> Success | Failed
//!                            \______________ error envelope ______/
//! ```
//!
//! Every gate failure moves straight to `Failed`. The resume slot is consumed before any
//! validation, so a response is interpreted against a given state at most once.

// self
use crate::{
	_prelude::*,
	auth::{AuthenticationResult, TokenCacheItem, UserInformation},
	crypto::{self, BrokerKeyProvider, DecryptedPayload, ProtocolVersion},
	flows::BrokerClient,
	obs::{self, FlowKind, FlowSpan},
	resume::{ResumeState, ResumeStateStore},
	wire::{self, BrokerResponseEnvelope, Fields},
};

/// States visited while processing a broker response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExchangeStage {
	/// Waiting for the persisted request state.
	AwaitingResume,
	/// Resume state matched the response URL.
	Validated,
	/// Payload decrypted.
	Decrypted,
	/// Payload thumbprint matched the transmitted hash.
	HashVerified,
	/// Payload or error envelope turned into a result.
	Decoded,
	/// Terminal success.
	Success,
	/// Terminal failure.
	Failed,
}
impl ExchangeStage {
	/// Returns a stable label suitable for span or log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::AwaitingResume => "awaiting_resume",
			Self::Validated => "validated",
			Self::Decrypted => "decrypted",
			Self::HashVerified => "hash_verified",
			Self::Decoded => "decoded",
			Self::Success => "success",
			Self::Failed => "failed",
		}
	}
}
impl Display for ExchangeStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome of running the state machine once.
#[derive(Debug)]
pub struct ProcessedResponse {
	/// Terminal result.
	pub result: AuthenticationResult,
	/// Resume state consumed by this run, when one was pending and readable.
	pub resume: Option<ResumeState>,
	/// Stages visited in order, ending with `Success` or `Failed`.
	pub path: Vec<ExchangeStage>,
}

struct Machine {
	path: Vec<ExchangeStage>,
	correlation_id: Option<Uuid>,
}
impl Machine {
	fn advance(&mut self, stage: ExchangeStage) {
		self.path.push(stage);
	}

	fn fail(&self, error: impl Into<Error>) -> AuthenticationResult {
		AuthenticationResult::failed(error, self.correlation_id)
	}
}

/// Runs the response state machine for a URL already recognized as a broker response.
///
/// `raw_url` is matched against the stored redirect URI exactly as received.
pub fn process_response(
	url: &Url,
	raw_url: &str,
	resume_store: &dyn ResumeStateStore,
	key_provider: &dyn BrokerKeyProvider,
) -> ProcessedResponse {
	let mut machine = Machine { path: vec![ExchangeStage::AwaitingResume], correlation_id: None };
	let resume = match resume_store.take() {
		Ok(Some(resume)) => resume,
		Ok(None) => {
			let result = machine.fail(Error::NoResumeState);

			return finish(machine, result, None);
		},
		Err(err) => {
			let result = machine.fail(err);

			return finish(machine, result, None);
		},
	};

	machine.correlation_id = Some(resume.correlation_id);

	let result = run(&mut machine, url, raw_url, &resume, key_provider)
		.unwrap_or_else(|err| machine.fail(err));

	finish(machine, result, Some(resume))
}

fn finish(
	mut machine: Machine,
	result: AuthenticationResult,
	resume: Option<ResumeState>,
) -> ProcessedResponse {
	machine.advance(if result.is_success() { ExchangeStage::Success } else { ExchangeStage::Failed });

	ProcessedResponse { result, resume, path: machine.path }
}

fn run(
	machine: &mut Machine,
	url: &Url,
	raw_url: &str,
	resume: &ResumeState,
	key_provider: &dyn BrokerKeyProvider,
) -> Result<AuthenticationResult> {
	if resume.redirect_uri.trim().is_empty() {
		return Err(Error::MissingRedirectUri);
	}
	if !resume.matches_response(raw_url) {
		return Err(Error::MismatchedResumeState { expected: resume.redirect_uri.clone() });
	}

	machine.advance(ExchangeStage::Validated);

	let (response, hash, version) = match BrokerResponseEnvelope::from_url(url) {
		BrokerResponseEnvelope::Error { code, description, .. } => {
			machine.advance(ExchangeStage::Decoded);

			return Ok(machine.fail(Error::BrokerRejected { code, description }));
		},
		BrokerResponseEnvelope::Encrypted { response, hash, version } => (response, hash, version),
	};
	let hash = hash.filter(|h| !h.trim().is_empty()).ok_or(Error::HashMissing)?;
	let payload = decrypt(response.as_deref(), version.as_deref(), key_provider)?;

	machine.advance(ExchangeStage::Decrypted);

	if !crypto::verify_thumbprint(&payload, &hash) {
		return Err(Error::ResponseHashMismatch);
	}

	machine.advance(ExchangeStage::HashVerified);

	let result = decode_result(&payload, resume)?;

	machine.advance(ExchangeStage::Decoded);

	Ok(result)
}

fn decrypt(
	response: Option<&str>,
	version: Option<&str>,
	key_provider: &dyn BrokerKeyProvider,
) -> Result<DecryptedPayload> {
	let sealed = crypto::decode_payload(response.unwrap_or_default())
		.map_err(Error::DecryptionFailed)?;
	let version = ProtocolVersion::from_wire(version)?;
	let key = key_provider.broker_key().map_err(Error::KeyUnavailable)?;

	version.decrypt(&key, &sealed).map_err(Error::DecryptionFailed)
}

/// Turns a verified plaintext payload into a result bound to `resume`.
///
/// Missing `authority`, `resource`, or `client_id` fall back to the request values. A payload
/// carrying `error_description` yields `Failed(BrokerRejected)`. Payloads that are not UTF-8,
/// carry unparsable or out-of-range expiries, or lack a token fail with `UnexpectedInternal`.
pub fn decode_result(payload: &[u8], resume: &ResumeState) -> Result<AuthenticationResult> {
	let text = std::str::from_utf8(payload)
		.map_err(|e| Error::internal(format!("payload is not UTF-8: {e}")))?;
	let mut fields = wire::decode_query(text);

	wire::strip_null_placeholders(&mut fields);

	let correlation_id = Some(resume.correlation_id);

	if let Some(description) = fields.remove(wire::ERROR_DESCRIPTION) {
		let code = fields.remove(wire::ERROR_CODE);

		return Ok(AuthenticationResult::failed(
			Error::BrokerRejected { code, description },
			correlation_id,
		));
	}

	let item = token_cache_item(&mut fields, resume)?;

	Ok(AuthenticationResult::succeeded(item, correlation_id))
}

fn token_cache_item(fields: &mut Fields, resume: &ResumeState) -> Result<TokenCacheItem> {
	let mut take = |name: &str, fallback: &str| {
		fields.remove(name).filter(|v| !v.is_empty()).unwrap_or_else(|| fallback.to_owned())
	};
	let authority = take(wire::AUTHORITY, &resume.authority);
	let resource = take(wire::RESOURCE, &resume.resource);
	let client_id = take(wire::CLIENT_ID, &resume.client_id);
	let mut builder = TokenCacheItem::builder(authority, resource, client_id);

	if let Some(access) = fields.remove(wire::ACCESS_TOKEN) {
		builder = builder.access_token(access);
	}
	if let Some(refresh) = fields.remove(wire::REFRESH_TOKEN) {
		builder = builder.refresh_token(refresh);
	}
	if let Some(token_type) = fields.remove(wire::TOKEN_TYPE) {
		builder = builder.token_type(token_type);
	}
	if let Some(family) = fields.remove(wire::FOCI) {
		builder = builder.family_id(family);
	}
	if let Some(expires_on) = fields.remove(wire::EXPIRES_ON) {
		builder = builder.expires_on(parse_expires_on(&expires_on)?);
	} else if let Some(expires_in) = fields.remove(wire::EXPIRES_IN) {
		let seconds = parse_seconds(wire::EXPIRES_IN, &expires_in)?;

		builder = builder.expires_in(Duration::seconds(seconds));
	}

	let user = match fields.remove(wire::ID_TOKEN) {
		Some(id_token) => UserInformation::from_id_token(&id_token).ok(),
		None => None,
	}
	.or_else(|| fields.remove(wire::USER_ID).map(UserInformation::with_user_id));

	if let Some(user) = user {
		builder = builder.user_information(user);
	}

	builder.build().map_err(|e| Error::internal(format!("verified payload is incomplete: {e}")))
}

fn parse_seconds(field: &str, value: &str) -> Result<i64> {
	let secs = value
		.trim()
		.parse::<f64>()
		.map_err(|_| Error::internal(format!("`{field}` is not a number: {value}")))?;

	if !secs.is_finite() || secs.abs() >= i64::MAX as f64 {
		return Err(Error::internal(format!("`{field}` is out of range: {value}")));
	}

	Ok(secs as i64)
}

fn parse_expires_on(value: &str) -> Result<OffsetDateTime> {
	OffsetDateTime::from_unix_timestamp(parse_seconds(wire::EXPIRES_ON, value)?)
		.map_err(|e| Error::internal(format!("`{}` is out of range: {e}", wire::EXPIRES_ON)))
}

impl BrokerClient {
	/// Processes a URL the application was opened with.
	///
	/// Returns `false`, leaving the resume slot untouched, when the URL is not a broker response.
	/// Otherwise the response is fully processed, its result delivered to the pending caller (or
	/// kept as the interrupted result), and `true` is returned regardless of success.
	pub async fn handle_broker_response(&self, url: &str) -> bool {
		const KIND: FlowKind = FlowKind::ProcessResponse;

		let Ok(parsed) = Url::parse(url.trim()) else {
			return false;
		};

		if !wire::is_broker_response(&parsed) {
			return false;
		}

		let span = FlowSpan::new(KIND, "handle_broker_response");

		obs::record_flow_outcome(KIND, obs::FlowOutcome::Attempt);

		span.instrument(async move {
			let _exchange = self.exchange_guard.lock().await;
			let processed = process_response(
				&parsed,
				url.trim(),
				self.resume_store.as_ref(),
				self.key_provider.as_ref(),
			);

			for stage in &processed.path {
				obs::record_stage(KIND, stage.as_str());
			}

			let result = match (&processed.resume, processed.result.is_success()) {
				(Some(resume), true) => self.on_verified_success(processed.result, resume).await,
				_ => processed.result,
			};

			self.record_outcome(KIND, &result);
			self.completions.complete(result);
		})
		.await;

		true
	}

	/// Returns `true` when `url` came from a configured broker and carries a broker response.
	pub fn is_response_from_broker(&self, source_application: &str, url: &str) -> bool {
		self.config.is_broker_app(source_application)
			&& Url::parse(url.trim()).is_ok_and(|parsed| wire::is_broker_response(&parsed))
	}
}
