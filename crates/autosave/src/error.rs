//! Error types for autosave collaborators and configuration.

use std::time::Duration;

use savepoint_worker::Cancelled;
use thiserror::Error;

/// Boxed error produced by a store backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Outcome of a call into an external store or file loader.
#[derive(Debug, Error)]
pub enum StoreError {
	/// The caller's generation token fired before the call finished.
	#[error("store operation cancelled")]
	Cancelled,

	/// The backend reported a failure.
	#[error(transparent)]
	Backend(BoxError),
}

impl StoreError {
	/// Wraps a backend failure.
	pub fn backend(err: impl Into<BoxError>) -> Self {
		Self::Backend(err.into())
	}

	/// Returns true for the cancellation outcome.
	pub fn is_cancelled(&self) -> bool {
		matches!(self, Self::Cancelled)
	}
}

impl From<Cancelled> for StoreError {
	fn from(_: Cancelled) -> Self {
		Self::Cancelled
	}
}

/// Failure classification inside a saving session.
///
/// None of these reach callers of the coordinator: cancellation is swallowed,
/// local-cache failures are logged, cloud failures drive the retry loop.
#[derive(Debug, Error)]
pub enum AutoSaveError {
	/// The session was superseded or disposed.
	#[error("saving cancelled")]
	Cancelled,

	/// Writing the snapshot to the local cache failed.
	#[error("failed to save to local cache: {0}")]
	LocalCacheWrite(#[source] StoreError),

	/// Saving the snapshot to the durable store failed.
	#[error("failed to save project to cloud: {0}")]
	CloudSave(#[source] StoreError),
}

impl AutoSaveError {
	/// Classifies a local-cache outcome, folding store cancellation into [`Self::Cancelled`].
	pub fn local_cache_write(err: StoreError) -> Self {
		if err.is_cancelled() { Self::Cancelled } else { Self::LocalCacheWrite(err) }
	}

	/// Classifies a cloud-save outcome, folding store cancellation into [`Self::Cancelled`].
	pub fn cloud_save(err: StoreError) -> Self {
		if err.is_cancelled() { Self::Cancelled } else { Self::CloudSave(err) }
	}

	/// Returns true for the cancellation outcome.
	pub fn is_cancelled(&self) -> bool {
		matches!(self, Self::Cancelled)
	}
}

impl From<Cancelled> for AutoSaveError {
	fn from(_: Cancelled) -> Self {
		Self::Cancelled
	}
}

/// Errors rejected by [`crate::AutoSaveConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
	/// A zero retry delay would spin on a failing durable store.
	#[error("retry delay must be greater than zero")]
	ZeroRetryDelay,

	/// The cloud attempt must not be scheduled before the local-cache write.
	#[error("cloud persist delay ({cloud:?}) is shorter than local persist delay ({local:?})")]
	CloudBeforeLocal {
		/// Configured local persist delay.
		local: Duration,
		/// Configured cloud persist delay.
		cloud: Duration,
	},
}
