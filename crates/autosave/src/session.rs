//! One persistence lifecycle for one snapshot generation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use savepoint_worker::{GenerationToken, TaskClass};
use tokio::sync::{Mutex, watch};

use crate::config::AutoSaveConfig;
use crate::error::AutoSaveError;
use crate::project::{EditableProject, LocalStorage};

/// Progress of the cloud tier of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SavingState {
	/// Scheduled; no cloud attempt has started yet.
	Pending,
	/// A cloud attempt is in flight.
	InProgress,
	/// The durable store accepted the snapshot.
	Completed,
	/// The last attempt failed; a retry is scheduled.
	Failed,
}

/// Two-tier, retrying persistence of one snapshot.
///
/// The session exclusively owns its [`GenerationToken`]. Cancelling it stops
/// both tiers at their next suspension point and is never reported as a
/// failure.
pub struct SavingSession {
	project: Arc<dyn EditableProject>,
	local_storage: Arc<dyn LocalStorage>,
	online: watch::Receiver<bool>,
	local_cache_key: Arc<str>,
	token: GenerationToken,
	config: AutoSaveConfig,
	state: watch::Sender<SavingState>,
	/// Held for the duration of one cloud attempt.
	inflight: Mutex<()>,
	retry_scheduled: AtomicBool,
}

impl std::fmt::Debug for SavingSession {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SavingSession")
			.field("generation", &self.token.generation())
			.field("key", &self.local_cache_key)
			.field("state", &self.state())
			.finish_non_exhaustive()
	}
}

impl SavingSession {
	/// Creates a session in [`SavingState::Pending`]. Nothing runs until [`Self::start`].
	pub fn new(
		project: Arc<dyn EditableProject>,
		local_storage: Arc<dyn LocalStorage>,
		online: watch::Receiver<bool>,
		local_cache_key: Arc<str>,
		token: GenerationToken,
		config: AutoSaveConfig,
	) -> Self {
		Self {
			project,
			local_storage,
			online,
			local_cache_key,
			token,
			config,
			state: watch::Sender::new(SavingState::Pending),
			inflight: Mutex::new(()),
			retry_scheduled: AtomicBool::new(false),
		}
	}

	/// Current state.
	pub fn state(&self) -> SavingState {
		*self.state.borrow()
	}

	/// Subscribes to state transitions.
	pub fn subscribe(&self) -> watch::Receiver<SavingState> {
		self.state.subscribe()
	}

	/// Generation of this session's token.
	pub fn generation(&self) -> u64 {
		self.token.generation()
	}

	/// The token owned by this session.
	pub fn token(&self) -> &GenerationToken {
		&self.token
	}

	/// Cancels this session. Pending timers and in-flight calls abort.
	pub fn cancel(&self) {
		self.token.cancel();
	}

	/// Schedules the local-cache write and the gated cloud save.
	///
	/// The two tiers run as independent tasks sharing this session's token and
	/// never wait on each other.
	pub fn start(self: &Arc<Self>) {
		tracing::debug!(
			generation = self.generation(),
			key = %self.local_cache_key,
			"autosave.session.start"
		);

		let session = Arc::clone(self);
		savepoint_worker::spawn(TaskClass::Background, async move { session.persist_locally().await });

		let session = Arc::clone(self);
		savepoint_worker::spawn(TaskClass::Background, async move { session.persist_to_cloud_when_online().await });
	}

	async fn persist_locally(&self) {
		if self.token.sleep(self.config.local_persist_delay).await.is_err() {
			return;
		}
		match self.write_local_cache().await {
			Ok(()) => {
				tracing::debug!(generation = self.generation(), key = %self.local_cache_key, "autosave.local_cache.saved");
			}
			Err(err) if err.is_cancelled() => {
				tracing::trace!(generation = self.generation(), "autosave.local_cache.cancelled");
			}
			Err(err) => {
				tracing::warn!(
					generation = self.generation(),
					key = %self.local_cache_key,
					error = %err,
					"autosave.local_cache.failed"
				);
			}
		}
	}

	async fn write_local_cache(&self) -> Result<(), AutoSaveError> {
		self.token
			.run(self.project.save_to_local_cache(&self.local_cache_key, &self.token))
			.await?
			.map_err(AutoSaveError::local_cache_write)
	}

	async fn persist_to_cloud_when_online(self: Arc<Self>) {
		if self.token.sleep(self.config.cloud_persist_delay).await.is_err() {
			return;
		}
		if !*self.online.borrow() {
			tracing::debug!(generation = self.generation(), "autosave.cloud.waiting_online");
		}
		if self.token.wait_until(self.online.clone(), |online| *online).await.is_err() {
			return;
		}
		self.save_to_cloud().await;
	}

	/// Runs one cloud-save attempt now.
	///
	/// On failure the state becomes [`SavingState::Failed`] and retries
	/// continue in the background every `retry_delay` until one succeeds or the
	/// session is cancelled. At most one attempt is in flight per session; an
	/// attempt that finds the session already completed does nothing.
	pub async fn save_to_cloud(self: &Arc<Self>) {
		let Err(err) = self.attempt_cloud_save().await else {
			return;
		};
		if err.is_cancelled() {
			return;
		}
		self.report_cloud_failure(&err);
		if self.retry_scheduled.swap(true, Ordering::AcqRel) {
			return;
		}
		let session = Arc::clone(self);
		savepoint_worker::spawn(TaskClass::Background, async move { session.retry_cloud_save().await });
	}

	async fn retry_cloud_save(&self) {
		loop {
			if self.token.sleep(self.config.retry_delay).await.is_err() {
				break;
			}
			match self.attempt_cloud_save().await {
				Ok(()) => break,
				Err(err) if err.is_cancelled() => break,
				Err(err) => self.report_cloud_failure(&err),
			}
		}
		self.retry_scheduled.store(false, Ordering::Release);
	}

	fn report_cloud_failure(&self, err: &AutoSaveError) {
		tracing::error!(
			generation = self.generation(),
			retry_in_ms = self.config.retry_delay.as_millis() as u64,
			error = %err,
			"autosave.cloud.failed"
		);
	}

	async fn attempt_cloud_save(&self) -> Result<(), AutoSaveError> {
		let _inflight = self.token.run(self.inflight.lock()).await?;
		if self.state() == SavingState::Completed {
			return Ok(());
		}

		self.set_state(SavingState::InProgress);
		let outcome = self.token.run(self.project.save_to_cloud(&self.token)).await?;
		if let Err(err) = outcome {
			let err = AutoSaveError::cloud_save(err);
			if !err.is_cancelled() {
				self.set_state(SavingState::Failed);
			}
			return Err(err);
		}
		// A save that resolves after supersession belongs to a dead generation.
		self.token.check()?;

		self.set_state(SavingState::Completed);
		tracing::debug!(generation = self.generation(), "autosave.cloud.saved");
		self.erase_local_cache();
		Ok(())
	}

	fn erase_local_cache(&self) {
		let storage = Arc::clone(&self.local_storage);
		let key = Arc::clone(&self.local_cache_key);
		let generation = self.generation();
		savepoint_worker::spawn(TaskClass::Background, async move {
			if let Err(err) = storage.clear(&key).await {
				tracing::warn!(generation, key = %key, error = %err, "autosave.local_cache.clear_failed");
			}
		});
	}

	fn set_state(&self, state: SavingState) {
		let previous = self.state.send_replace(state);
		tracing::trace!(generation = self.generation(), from = ?previous, to = ?state, "autosave.session.state");
	}
}
