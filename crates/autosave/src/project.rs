//! Collaborator contracts consumed by autosave.

use async_trait::async_trait;
use savepoint_worker::GenerationToken;
use tokio::sync::watch;

use crate::error::StoreError;
use crate::files::Files;

/// The project being edited, as seen by autosave.
///
/// Payload shapes and wire formats belong to the implementation; autosave only
/// decides when these calls happen. Both save calls receive the session token
/// and should return [`StoreError::Cancelled`] once it fires.
#[async_trait]
pub trait EditableProject: Send + Sync + 'static {
	/// Identity owning the project, if known.
	fn owner(&self) -> Option<&str>;

	/// Reactive source of the current file snapshot.
	fn files(&self) -> watch::Receiver<Files>;

	/// Persists the current snapshot to the durable store.
	async fn save_to_cloud(&self, token: &GenerationToken) -> Result<(), StoreError>;

	/// Persists the current snapshot to the local cache under `key`.
	async fn save_to_local_cache(&self, key: &str, token: &GenerationToken) -> Result<(), StoreError>;
}

/// Eraser for local-cache entries.
#[async_trait]
pub trait LocalStorage: Send + Sync + 'static {
	/// Removes the cached snapshot stored under `key`.
	async fn clear(&self, key: &str) -> Result<(), StoreError>;
}
