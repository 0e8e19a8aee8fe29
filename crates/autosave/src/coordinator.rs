use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use savepoint_worker::{GenerationClock, GenerationToken, TaskClass};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::AutoSaveConfig;
use crate::error::ConfigError;
use crate::files::Files;
use crate::mode::{EditingMode, resolve_mode};
use crate::prefetch::Prefetcher;
use crate::project::{EditableProject, LocalStorage};
use crate::session::{SavingSession, SavingState};

/// Display projection of the autosave pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutoSaveState {
	/// Nothing to persist: no current session, or the current one completed.
	Saved,
	/// A change is waiting for its scheduled save.
	Pending,
	/// A cloud attempt is in flight.
	Saving,
	/// The last cloud attempt failed; a retry is scheduled.
	Failed,
}

impl From<SavingState> for AutoSaveState {
	fn from(state: SavingState) -> Self {
		match state {
			SavingState::Pending => Self::Pending,
			SavingState::InProgress => Self::Saving,
			SavingState::Completed => Self::Saved,
			SavingState::Failed => Self::Failed,
		}
	}
}

/// Coordinates autosave for one project.
///
/// Watches the project's file snapshot; every change supersedes the current
/// [`SavingSession`] and, in [`EditingMode::AutoSave`], starts a new one.
/// Dropping the coordinator disposes it.
pub struct EditingCoordinator {
	shared: Arc<Shared>,
}

struct Shared {
	project: Arc<dyn EditableProject>,
	local_storage: Arc<dyn LocalStorage>,
	online: watch::Receiver<bool>,
	signed_in: watch::Receiver<Option<String>>,
	local_cache_key: Arc<str>,
	config: AutoSaveConfig,
	clock: GenerationClock,
	/// Parent of every session and prefetch token; cancelled on dispose.
	root: CancellationToken,
	/// Mutated only by the snapshot watcher, the session monitors and dispose.
	current: Mutex<Option<Arc<SavingSession>>>,
	dirty: watch::Sender<bool>,
	status: watch::Sender<AutoSaveState>,
	started: AtomicBool,
}

impl EditingCoordinator {
	/// Creates a coordinator with the default [`AutoSaveConfig`].
	pub fn new(
		project: Arc<dyn EditableProject>,
		local_storage: Arc<dyn LocalStorage>,
		online: watch::Receiver<bool>,
		signed_in: watch::Receiver<Option<String>>,
		local_cache_key: impl Into<Arc<str>>,
	) -> Self {
		Self::build(project, local_storage, online, signed_in, local_cache_key.into(), AutoSaveConfig::default())
	}

	/// Creates a coordinator with custom delays.
	pub fn new_with_config(
		project: Arc<dyn EditableProject>,
		local_storage: Arc<dyn LocalStorage>,
		online: watch::Receiver<bool>,
		signed_in: watch::Receiver<Option<String>>,
		local_cache_key: impl Into<Arc<str>>,
		config: AutoSaveConfig,
	) -> Result<Self, ConfigError> {
		config.validate()?;
		Ok(Self::build(project, local_storage, online, signed_in, local_cache_key.into(), config))
	}

	fn build(
		project: Arc<dyn EditableProject>,
		local_storage: Arc<dyn LocalStorage>,
		online: watch::Receiver<bool>,
		signed_in: watch::Receiver<Option<String>>,
		local_cache_key: Arc<str>,
		config: AutoSaveConfig,
	) -> Self {
		Self {
			shared: Arc::new(Shared {
				project,
				local_storage,
				online,
				signed_in,
				local_cache_key,
				config,
				clock: GenerationClock::new(),
				root: CancellationToken::new(),
				current: Mutex::new(None),
				dirty: watch::Sender::new(false),
				status: watch::Sender::new(AutoSaveState::Saved),
				started: AtomicBool::new(false),
			}),
		}
	}

	/// Current editing mode, derived from the signed-in identity and the project owner.
	pub fn mode(&self) -> EditingMode {
		self.shared.mode()
	}

	/// True once the snapshot changed since the last successful save.
	pub fn is_dirty(&self) -> bool {
		*self.shared.dirty.borrow()
	}

	/// Subscribes to dirty-flag changes.
	pub fn subscribe_dirty(&self) -> watch::Receiver<bool> {
		self.shared.dirty.subscribe()
	}

	/// Projection of the current session's state.
	pub fn auto_save_state(&self) -> AutoSaveState {
		self.shared
			.current
			.lock()
			.as_ref()
			.map_or(AutoSaveState::Saved, |session| session.state().into())
	}

	/// Subscribes to [`AutoSaveState`] transitions.
	///
	/// Transitions are published from a monitor task, so a subscriber may
	/// observe only the latest of several rapid changes.
	pub fn subscribe_auto_save_state(&self) -> watch::Receiver<AutoSaveState> {
		self.shared.status.subscribe()
	}

	/// The current session, if any.
	pub fn saving(&self) -> Option<Arc<SavingSession>> {
		self.shared.current.lock().clone()
	}

	/// Starts the prefetch and autosave watchers. Calling it again is a no-op.
	pub fn start(&self) {
		if self.shared.started.swap(true, Ordering::AcqRel) || self.shared.root.is_cancelled() {
			return;
		}
		tracing::debug!(key = %self.shared.local_cache_key, mode = ?self.mode(), "autosave.coordinator.start");

		let prefetcher = Prefetcher::new(self.shared.root.clone(), self.shared.clock.clone());
		savepoint_worker::spawn(TaskClass::Background, prefetcher.run(self.shared.project.files()));

		// Primed here so edits made before the watcher first runs still count.
		let shared = Arc::clone(&self.shared);
		let files = self.shared.subscribe_files();
		savepoint_worker::spawn(TaskClass::Background, shared.watch_snapshots(files));
	}

	/// Saves the current session to the cloud now, skipping scheduling delays.
	///
	/// Does nothing when there is no current session. Returns once this one
	/// attempt settles: a failed attempt leaves the session
	/// [`AutoSaveState::Failed`] and the retry loop keeps going in the
	/// background, so callers that need durability should watch
	/// [`Self::subscribe_auto_save_state`]. The attempt runs on its own task and
	/// completes even if the returned future is dropped.
	pub async fn flush_saving(&self) {
		let Some(session) = self.saving() else {
			return;
		};
		tracing::debug!(generation = session.generation(), "autosave.flush");
		let attempt = savepoint_worker::spawn(TaskClass::Interactive, async move { session.save_to_cloud().await });
		if let Err(err) = attempt.await {
			tracing::warn!(error = %err, "autosave.flush.aborted");
		}
	}

	/// Cancels the current session and stops watching. Idempotent.
	pub fn dispose(&self) {
		self.shared.dispose();
	}
}

impl Drop for EditingCoordinator {
	fn drop(&mut self) {
		self.shared.dispose();
	}
}

impl Shared {
	fn mode(&self) -> EditingMode {
		resolve_mode(self.signed_in.borrow().as_deref(), self.project.owner())
	}

	fn subscribe_files(&self) -> watch::Receiver<Files> {
		let mut files = self.project.files();
		files.mark_unchanged();
		files
	}

	async fn watch_snapshots(self: Arc<Self>, mut files: watch::Receiver<Files>) {
		loop {
			tokio::select! {
				biased;
				_ = self.root.cancelled() => break,
				changed = files.changed() => {
					if changed.is_err() {
						tracing::debug!("autosave.snapshot_source.closed");
						break;
					}
				}
			}
			self.on_snapshot_changed();
		}
	}

	/// Supersedes the current session. Dirty and status are published while
	/// `current` is held so monitors and dispose observe them in order.
	fn on_snapshot_changed(self: &Arc<Self>) {
		let mut current = self.current.lock();
		if self.root.is_cancelled() {
			return;
		}
		self.dirty.send_replace(true);
		if let Some(previous) = current.take() {
			previous.cancel();
			tracing::debug!(generation = previous.generation(), "autosave.session.superseded");
		}

		if self.mode() == EditingMode::EffectFree {
			self.status.send_replace(AutoSaveState::Saved);
			drop(current);
			tracing::trace!("autosave.effect_free.skip");
			return;
		}

		let token = GenerationToken::new(self.clock.next(), self.root.child_token());
		let session = Arc::new(SavingSession::new(
			Arc::clone(&self.project),
			Arc::clone(&self.local_storage),
			self.online.clone(),
			Arc::clone(&self.local_cache_key),
			token,
			self.config,
		));
		*current = Some(Arc::clone(&session));
		self.status.send_replace(AutoSaveState::Pending);
		drop(current);

		self.monitor(&session);
		session.start();
	}

	/// Forwards the session's transitions while it is current and clears it once cancelled.
	fn monitor(self: &Arc<Self>, session: &Arc<SavingSession>) {
		let shared = Arc::clone(self);
		let generation = session.generation();
		let token = session.token().clone();
		let mut states = session.subscribe();
		savepoint_worker::spawn(TaskClass::Background, async move {
			loop {
				tokio::select! {
					biased;
					_ = token.cancelled() => {
						shared.release(generation);
						break;
					}
					changed = states.changed() => {
						if changed.is_err() {
							break;
						}
						let state = *states.borrow_and_update();
						shared.on_session_state(generation, state);
					}
				}
			}
		});
	}

	fn on_session_state(&self, generation: u64, state: SavingState) {
		let current = self.current.lock();
		if current.as_ref().map(|s| s.generation()) != Some(generation) {
			return;
		}
		self.status.send_replace(state.into());
		if state == SavingState::Completed {
			self.dirty.send_replace(false);
		}
	}

	fn release(&self, generation: u64) {
		let mut current = self.current.lock();
		if current.as_ref().map(|s| s.generation()) == Some(generation) {
			*current = None;
			self.status.send_replace(AutoSaveState::Saved);
		}
	}

	fn dispose(&self) {
		if self.root.is_cancelled() {
			return;
		}
		self.root.cancel();
		let mut current = self.current.lock();
		if let Some(session) = current.take() {
			session.cancel();
		}
		self.status.send_replace(AutoSaveState::Saved);
		drop(current);
		tracing::debug!(key = %self.local_cache_key, "autosave.coordinator.disposed");
	}
}
