//! Settings-file backed [`ResumeStateStore`] that survives process restarts.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	resume::{RESUME_STATE_KEY, ResumeState, ResumeStateStore},
	store::{StoreError, file},
};

type Settings = BTreeMap<String, Value>;

/// Stores the resume slot under [`RESUME_STATE_KEY`] inside a JSON settings file.
///
/// The file is re-read on every operation because the response usually arrives in a later
/// process than the one that saved the state. Other keys in the file are preserved.
#[derive(Debug)]
pub struct FileResumeStore {
	path: PathBuf,
	lock: Mutex<()>,
}
impl FileResumeStore {
	/// Creates a store backed by the settings file at `path`.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into(), lock: Mutex::new(()) }
	}

	/// Location of the settings file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load(&self) -> Result<Settings, StoreError> {
		match file::read_if_present(&self.path)? {
			Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", self.path.display()),
			}),
			None => Ok(Settings::new()),
		}
	}

	fn persist(&self, settings: &Settings) -> Result<(), StoreError> {
		let serialized =
			serde_json::to_vec_pretty(settings).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize settings: {e}"),
			})?;

		file::write_atomically(&self.path, &serialized)
	}

	fn decode(value: Value) -> Result<ResumeState, StoreError> {
		serde_json::from_value(value).map_err(|e| StoreError::Serialization {
			message: format!("Failed to decode resume state: {e}"),
		})
	}
}
impl ResumeStateStore for FileResumeStore {
	fn save(&self, state: ResumeState) -> Result<(), StoreError> {
		let _guard = self.lock.lock();
		let mut settings = self.load()?;
		let value = serde_json::to_value(&state).map_err(|e| StoreError::Serialization {
			message: format!("Failed to encode resume state: {e}"),
		})?;

		settings.insert(RESUME_STATE_KEY.into(), value);

		self.persist(&settings)
	}

	fn take(&self) -> Result<Option<ResumeState>, StoreError> {
		let _guard = self.lock.lock();
		let mut settings = self.load()?;
		let Some(value) = settings.remove(RESUME_STATE_KEY) else {
			return Ok(None);
		};

		self.persist(&settings)?;

		Self::decode(value).map(Some)
	}

	fn peek(&self) -> Result<Option<ResumeState>, StoreError> {
		let _guard = self.lock.lock();

		self.load()?.remove(RESUME_STATE_KEY).map(Self::decode).transpose()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::fs;
	// self
	use super::*;
	use crate::{resume::sample_state, store::file::temp_path};

	#[test]
	fn state_survives_a_new_store_instance() {
		let path = temp_path("resume");
		let state = sample_state("x-app://com.contoso.app");

		FileResumeStore::new(&path).save(state.clone()).expect("Saving resume state should succeed.");

		let reopened = FileResumeStore::new(&path);

		assert_eq!(reopened.take().expect("Take should succeed."), Some(state));
		assert_eq!(reopened.take().expect("Second take should succeed."), None);

		let _ = fs::remove_file(&path);
	}

	#[test]
	fn unrelated_settings_are_preserved() {
		let path = temp_path("resume_settings");

		fs::write(&path, br#"{"theme":"dark"}"#).expect("Seeding settings should succeed.");

		let store = FileResumeStore::new(&path);

		store.save(sample_state("x-app://com.contoso.app")).expect("Saving should succeed.");
		store.take().expect("Take should succeed.");

		let settings: Settings = serde_json::from_slice(
			&fs::read(&path).expect("Settings file should remain readable."),
		)
		.expect("Settings file should remain valid JSON.");

		assert_eq!(settings.get("theme"), Some(&Value::String("dark".into())));
		assert!(!settings.contains_key(RESUME_STATE_KEY));

		let _ = fs::remove_file(&path);
	}

	#[test]
	fn corrupt_state_is_cleared_even_when_it_cannot_be_decoded() {
		let path = temp_path("resume_corrupt");

		fs::write(&path, format!(r#"{{"{RESUME_STATE_KEY}":{{"authority":1}}}}"#))
			.expect("Seeding corrupt settings should succeed.");

		let store = FileResumeStore::new(&path);

		assert!(matches!(store.take(), Err(StoreError::Serialization { .. })));
		assert_eq!(store.take().expect("Slot should be empty after a failed take."), None);

		let _ = fs::remove_file(&path);
	}
}
