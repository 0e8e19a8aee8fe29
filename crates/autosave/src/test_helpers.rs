//! In-memory collaborators for exercising autosave on a paused tokio clock.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use savepoint_worker::GenerationToken;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::StoreError;
use crate::files::{Files, LazyFile};
use crate::project::{EditableProject, LocalStorage};

/// Scripted outcome of one mocked cloud save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudOutcome {
	/// The save resolves successfully.
	Succeed,
	/// The save rejects with a backend error.
	Fail,
}

/// A file that counts its loads.
#[derive(Debug)]
pub struct MockFile {
	name: String,
	fail: bool,
	loads: AtomicUsize,
}

impl MockFile {
	/// Creates a file whose loads succeed.
	pub fn new(name: impl Into<String>) -> Arc<Self> {
		Arc::new(Self {
			name: name.into(),
			fail: false,
			loads: AtomicUsize::new(0),
		})
	}

	/// Creates a file whose loads always fail.
	pub fn failing(name: impl Into<String>) -> Arc<Self> {
		Arc::new(Self {
			name: name.into(),
			fail: true,
			loads: AtomicUsize::new(0),
		})
	}

	/// Number of load calls so far.
	pub fn loads(&self) -> usize {
		self.loads.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl LazyFile for MockFile {
	fn name(&self) -> &str {
		&self.name
	}

	async fn load(&self, token: &GenerationToken) -> Result<(), StoreError> {
		self.loads.fetch_add(1, Ordering::SeqCst);
		token.check()?;
		if self.fail {
			return Err(StoreError::backend(format!("cannot read {}", self.name)));
		}
		Ok(())
	}
}

#[derive(Debug, Default)]
struct Calls {
	cloud: Vec<Instant>,
	local: Vec<(String, Instant)>,
}

/// Project double with recorded calls and scripted outcomes.
///
/// Durations are slept on the session token, so cancellation interrupts a
/// mocked save the same way it would a real request.
pub struct MockProject {
	owner: Option<String>,
	files: watch::Sender<Files>,
	cloud_duration: Duration,
	local_duration: Duration,
	local_fails: bool,
	cloud_script: Mutex<VecDeque<CloudOutcome>>,
	calls: Mutex<Calls>,
	edits: AtomicUsize,
}

impl MockProject {
	/// Creates a project owned by `owner` holding three files.
	pub fn new(owner: impl Into<String>) -> Self {
		Self::with_owner(Some(owner.into()))
	}

	/// Creates a project with an optional owner holding three files.
	pub fn with_owner(owner: Option<String>) -> Self {
		let files = Files::default()
			.with("file1.txt", MockFile::new("file1.txt"))
			.with("file2.txt", MockFile::new("file2.txt"))
			.with("file3.txt", MockFile::new("file3.txt"));
		Self {
			owner,
			files: watch::Sender::new(files),
			cloud_duration: Duration::ZERO,
			local_duration: Duration::ZERO,
			local_fails: false,
			cloud_script: Mutex::new(VecDeque::new()),
			calls: Mutex::new(Calls::default()),
			edits: AtomicUsize::new(0),
		}
	}

	/// Makes every cloud save take `duration`.
	#[must_use]
	pub fn cloud_duration(mut self, duration: Duration) -> Self {
		self.cloud_duration = duration;
		self
	}

	/// Makes every local-cache write take `duration`.
	#[must_use]
	pub fn local_duration(mut self, duration: Duration) -> Self {
		self.local_duration = duration;
		self
	}

	/// Makes every local-cache write fail.
	#[must_use]
	pub fn failing_local_cache(mut self) -> Self {
		self.local_fails = true;
		self
	}

	/// Makes the next `times` cloud saves fail; later ones succeed.
	#[must_use]
	pub fn failing_cloud(self, times: usize) -> Self {
		self.cloud_script.lock().extend(std::iter::repeat_n(CloudOutcome::Fail, times));
		self
	}

	/// Publishes a new snapshot with `path` replaced by a fresh file.
	pub fn edit(&self, path: &str) {
		let n = self.edits.fetch_add(1, Ordering::SeqCst);
		let file = MockFile::new(format!("{path} #{n}"));
		self.edit_with(path, file);
	}

	/// Publishes a new snapshot with `path` set to `file`.
	pub fn edit_with(&self, path: &str, file: Arc<dyn LazyFile>) {
		self.files.send_modify(|files| *files = files.with(path, file));
	}

	/// The current snapshot.
	pub fn snapshot(&self) -> Files {
		self.files.borrow().clone()
	}

	/// Number of cloud-save calls.
	pub fn cloud_calls(&self) -> usize {
		self.calls.lock().cloud.len()
	}

	/// Virtual instants at which cloud saves were called.
	pub fn cloud_call_times(&self) -> Vec<Instant> {
		self.calls.lock().cloud.clone()
	}

	/// Number of local-cache writes.
	pub fn local_cache_calls(&self) -> usize {
		self.calls.lock().local.len()
	}

	/// Virtual instants at which local-cache writes were called.
	pub fn local_cache_call_times(&self) -> Vec<Instant> {
		self.calls.lock().local.iter().map(|(_, at)| *at).collect()
	}

	/// Keys passed to local-cache writes.
	pub fn local_cache_keys(&self) -> Vec<String> {
		self.calls.lock().local.iter().map(|(key, _)| key.clone()).collect()
	}
}

#[async_trait]
impl EditableProject for MockProject {
	fn owner(&self) -> Option<&str> {
		self.owner.as_deref()
	}

	fn files(&self) -> watch::Receiver<Files> {
		self.files.subscribe()
	}

	async fn save_to_cloud(&self, token: &GenerationToken) -> Result<(), StoreError> {
		self.calls.lock().cloud.push(Instant::now());
		let outcome = self.cloud_script.lock().pop_front().unwrap_or(CloudOutcome::Succeed);
		if !self.cloud_duration.is_zero() {
			token.sleep(self.cloud_duration).await?;
		}
		match outcome {
			CloudOutcome::Succeed => Ok(()),
			CloudOutcome::Fail => Err(StoreError::backend("cloud save failed")),
		}
	}

	async fn save_to_local_cache(&self, key: &str, token: &GenerationToken) -> Result<(), StoreError> {
		self.calls.lock().local.push((key.to_owned(), Instant::now()));
		if !self.local_duration.is_zero() {
			token.sleep(self.local_duration).await?;
		}
		if self.local_fails {
			return Err(StoreError::backend("local storage quota exceeded"));
		}
		Ok(())
	}
}

/// Local-storage double recording cleared keys.
#[derive(Debug, Default)]
pub struct MockLocalStorage {
	cleared: Mutex<Vec<(String, Instant)>>,
	fail: bool,
}

impl MockLocalStorage {
	/// Creates a storage whose clears succeed.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a storage whose clears fail after being recorded.
	pub fn failing() -> Self {
		Self {
			fail: true,
			..Self::default()
		}
	}

	/// Keys cleared so far.
	pub fn cleared_keys(&self) -> Vec<String> {
		self.cleared.lock().iter().map(|(key, _)| key.clone()).collect()
	}

	/// Virtual instants at which clears were called.
	pub fn clear_times(&self) -> Vec<Instant> {
		self.cleared.lock().iter().map(|(_, at)| *at).collect()
	}
}

#[async_trait]
impl LocalStorage for MockLocalStorage {
	async fn clear(&self, key: &str) -> Result<(), StoreError> {
		self.cleared.lock().push((key.to_owned(), Instant::now()));
		if self.fail {
			return Err(StoreError::backend("storage unavailable"));
		}
		Ok(())
	}
}

/// Lets woken tasks run without advancing the paused clock.
pub async fn settle() {
	for _ in 0..32 {
		tokio::task::yield_now().await;
	}
}

/// Advances the paused clock by `ms`, firing due timers in order, then settles.
pub async fn advance_ms(ms: u64) {
	tokio::time::sleep(Duration::from_millis(ms)).await;
	settle().await;
}

/// Milliseconds elapsed between `origin` and each instant.
pub fn offsets_ms(origin: Instant, instants: &[Instant]) -> Vec<u128> {
	instants.iter().map(|at| at.duration_since(origin).as_millis()).collect()
}
