//! Eager content warming for every published snapshot.

use savepoint_worker::{GenerationClock, GenerationToken, TaskClass};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::files::Files;

/// Loads every file of each new snapshot in the background.
///
/// Purely a latency optimization: failures are logged and never reach
/// autosave. Loads for a snapshot are cancelled once a newer one arrives.
pub(crate) struct Prefetcher {
	root: CancellationToken,
	clock: GenerationClock,
	current: Option<GenerationToken>,
}

impl Prefetcher {
	pub(crate) fn new(root: CancellationToken, clock: GenerationClock) -> Self {
		Self { root, clock, current: None }
	}

	/// Warms the snapshot current at startup, then every later one.
	pub(crate) async fn run(mut self, mut files: watch::Receiver<Files>) {
		let initial = files.borrow_and_update().clone();
		self.prefetch(&initial);
		loop {
			tokio::select! {
				biased;
				_ = self.root.cancelled() => break,
				changed = files.changed() => {
					if changed.is_err() {
						break;
					}
				}
			}
			let snapshot = files.borrow_and_update().clone();
			self.prefetch(&snapshot);
		}
		if let Some(token) = self.current.take() {
			token.cancel();
		}
	}

	fn prefetch(&mut self, snapshot: &Files) {
		if let Some(previous) = self.current.take() {
			previous.cancel();
		}
		let token = GenerationToken::new(self.clock.next(), self.root.child_token());
		tracing::trace!(generation = token.generation(), files = snapshot.len(), "autosave.prefetch");

		for (path, file) in snapshot.iter() {
			let file = file.clone();
			let path = path.to_owned();
			let token = token.clone();
			savepoint_worker::spawn(TaskClass::Background, async move {
				match token.run(file.load(&token)).await {
					Ok(Ok(())) | Err(_) => {}
					Ok(Err(err)) if err.is_cancelled() => {}
					Ok(Err(err)) => {
						tracing::warn!(file = %path, name = file.name(), error = %err, "autosave.prefetch.failed");
					}
				}
			});
		}
		self.current = Some(token);
	}
}
