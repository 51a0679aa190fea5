//! Process-local [`ResumeStateStore`].

// self
use crate::{
	_prelude::*,
	resume::{ResumeState, ResumeStateStore},
	store::StoreError,
};

/// Keeps the resume slot in memory; state does not survive a process restart.
#[derive(Debug, Default)]
pub struct MemoryResumeStore(Mutex<Option<ResumeState>>);
impl ResumeStateStore for MemoryResumeStore {
	fn save(&self, state: ResumeState) -> Result<(), StoreError> {
		*self.0.lock() = Some(state);

		Ok(())
	}

	fn take(&self) -> Result<Option<ResumeState>, StoreError> {
		Ok(self.0.lock().take())
	}

	fn peek(&self) -> Result<Option<ResumeState>, StoreError> {
		Ok(self.0.lock().clone())
	}
}
