// std
use std::fs;
// self
use broker_exchange::{
	_preludet::*,
	config::CacheWritePolicy,
	crypto::{BrokerKeyProvider, FileKeyProvider, ProtocolVersion},
	flows::BrokerClient,
	resume::{FileResumeStore, RESUME_STATE_KEY, ResumeStateStore},
	store::{CacheKey, FileCacheResolver, TokenCacheResolver},
};

const PAYLOAD: &str = "access_token=at-restart&refresh_token=rt-restart&expires_on=4102444800\
	&user_id=user-7";

struct Workspace(PathBuf);
impl Workspace {
	fn new(label: &str) -> Self {
		let root = std::env::temp_dir()
			.join(format!("broker_exchange_{label}_{}_{}", std::process::id(), Uuid::new_v4()));

		fs::create_dir_all(&root).expect("Temp workspace should be creatable.");

		Self(root)
	}

	fn client(&self, invoker: RecordingInvoker) -> BrokerClient {
		BrokerClient::new(
			test_config(CacheWritePolicy::Strict),
			Arc::new(FileResumeStore::new(self.0.join("settings.json"))),
			Arc::new(FileKeyProvider::new(self.0.join("broker_key.json"))),
			Arc::new(FileCacheResolver::new(self.0.join("caches"))),
			Arc::new(invoker),
		)
	}
}
impl Drop for Workspace {
	fn drop(&mut self) {
		let _ = fs::remove_dir_all(&self.0);
	}
}

#[tokio::test]
async fn response_is_resumed_by_a_new_process() -> color_eyre::Result<()> {
	let workspace = Workspace::new("restart");
	let request = test_request();
	let correlation_id = request.correlation_id;

	{
		let first_process = workspace.client(RecordingInvoker::default());

		// The first process exits before the broker answers.
		drop(first_process.acquire_token(request).await);
	}

	let settings = fs::read_to_string(workspace.0.join("settings.json"))?;

	assert!(settings.contains(RESUME_STATE_KEY));

	let second_process = workspace.client(RecordingInvoker::default());
	let key = FileKeyProvider::new(workspace.0.join("broker_key.json")).broker_key()?;
	let url = sealed_response_url(&key, PAYLOAD, ProtocolVersion::V2);

	assert!(second_process.handle_broker_response(&url).await);

	let result = second_process
		.take_interrupted_result()
		.expect("The relaunched process should receive the result.");

	assert!(result.is_success(), "{:?}", result.error());
	assert_eq!(result.correlation_id, Some(correlation_id));
	assert!(FileResumeStore::new(workspace.0.join("settings.json")).peek()?.is_none());

	let cache = FileCacheResolver::new(workspace.0.join("caches")).resolve(TEST_CACHE_GROUP)?;
	let key = CacheKey::new(
		"https://login.example.com/common",
		"https://graph.example.com",
		"client-1",
		Some("user-7".into()),
	);
	let item = cache.fetch(&key).await?.expect("The verified token should be persisted.");

	assert_eq!(item.access_token.expose(), "at-restart");
	assert_eq!(item.refresh_token.as_ref().map(|t| t.expose()), Some("rt-restart"));

	Ok(())
}

#[tokio::test]
async fn corrupt_resume_state_fails_the_exchange_and_is_cleared() -> color_eyre::Result<()> {
	let workspace = Workspace::new("corrupt");
	let settings = workspace.0.join("settings.json");

	fs::write(&settings, format!(r#"{{"{RESUME_STATE_KEY}":{{"redirect_uri":42}}}}"#))?;

	let client = workspace.client(RecordingInvoker::default());
	let key = FileKeyProvider::new(workspace.0.join("broker_key.json")).broker_key()?;
	let url = sealed_response_url(&key, PAYLOAD, ProtocolVersion::V1);

	assert!(client.handle_broker_response(&url).await);
	assert!(matches!(
		client.take_interrupted_result().and_then(|r| r.error),
		Some(Error::Storage(_))
	));
	assert!(FileResumeStore::new(&settings).peek()?.is_none());

	Ok(())
}
