use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Error returned by a suspension point whose token fired first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, thiserror::Error)]
#[error("generation cancelled")]
pub struct Cancelled;

/// Monotonic generation clock for cancellable lifecycles.
#[derive(Debug, Default, Clone)]
pub struct GenerationClock {
	next: Arc<AtomicU64>,
}

impl GenerationClock {
	/// Creates a new generation clock starting at generation 1.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the next generation ID.
	pub fn next(&self) -> u64 {
		self.next.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
	}
}

/// Generation-scoped cancellation token.
///
/// Every suspension point of a generation goes through this token so that
/// cancelling it halts timers, gates and in-flight calls at once.
#[derive(Debug, Clone)]
pub struct GenerationToken {
	generation: u64,
	cancel: CancellationToken,
}

impl GenerationToken {
	/// Creates a new generation token.
	pub fn new(generation: u64, cancel: CancellationToken) -> Self {
		Self { generation, cancel }
	}

	/// Returns generation ID.
	pub const fn generation(&self) -> u64 {
		self.generation
	}

	/// Returns true when cancellation is requested.
	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Requests cancellation.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Future resolving when cancellation is requested.
	pub async fn cancelled(&self) {
		self.cancel.cancelled().await;
	}

	/// Returns `Err(Cancelled)` if cancellation has been requested.
	pub fn check(&self) -> Result<(), Cancelled> {
		if self.is_cancelled() { Err(Cancelled) } else { Ok(()) }
	}

	/// Waits for `duration` unless cancelled first.
	pub async fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
		tokio::select! {
			biased;
			_ = self.cancel.cancelled() => Err(Cancelled),
			_ = tokio::time::sleep(duration) => Ok(()),
		}
	}

	/// Drives `fut` to completion unless cancelled first.
	///
	/// The future is dropped at the first poll after cancellation.
	pub async fn run<F>(&self, fut: F) -> Result<F::Output, Cancelled>
	where
		F: Future,
	{
		tokio::select! {
			biased;
			_ = self.cancel.cancelled() => Err(Cancelled),
			out = fut => Ok(out),
		}
	}

	/// Waits until `source` holds a value matching `pred`.
	///
	/// Resolves immediately when the current value already matches. A source
	/// whose sender is gone can never match; the wait then parks until
	/// cancellation.
	pub async fn wait_until<T, P>(&self, mut source: watch::Receiver<T>, mut pred: P) -> Result<(), Cancelled>
	where
		P: FnMut(&T) -> bool,
	{
		let matched = tokio::select! {
			biased;
			_ = self.cancel.cancelled() => return Err(Cancelled),
			res = source.wait_for(|value| pred(value)) => res.is_ok(),
		};
		if matched {
			return Ok(());
		}
		tracing::trace!(generation = self.generation, "worker.wait_until.source_closed");
		self.cancel.cancelled().await;
		Err(Cancelled)
	}
}
