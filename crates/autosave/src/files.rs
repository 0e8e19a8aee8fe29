//! Opaque project file snapshots.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use savepoint_worker::GenerationToken;

use crate::error::StoreError;

/// One project file whose content is fetched on demand.
#[async_trait]
pub trait LazyFile: Send + Sync + 'static {
	/// File name, used for diagnostics only.
	fn name(&self) -> &str;

	/// Warms the content cache for this file.
	///
	/// Implementations should observe `token` and return
	/// [`StoreError::Cancelled`] when it fires.
	async fn load(&self, token: &GenerationToken) -> Result<(), StoreError>;
}

/// Snapshot of all project files at one instant.
///
/// Cloning is cheap. Autosave never inspects the entries; it only reacts to a
/// new snapshot being published. Prefetch is the only consumer of
/// [`Files::iter`].
#[derive(Clone, Default)]
pub struct Files {
	entries: Arc<BTreeMap<String, Arc<dyn LazyFile>>>,
}

impl Files {
	/// Builds a snapshot from `(path, file)` pairs.
	pub fn new(entries: impl IntoIterator<Item = (String, Arc<dyn LazyFile>)>) -> Self {
		Self {
			entries: Arc::new(entries.into_iter().collect()),
		}
	}

	/// Returns a new snapshot with `path` set to `file`.
	#[must_use]
	pub fn with(&self, path: impl Into<String>, file: Arc<dyn LazyFile>) -> Self {
		let mut entries = (*self.entries).clone();
		entries.insert(path.into(), file);
		Self {
			entries: Arc::new(entries),
		}
	}

	/// Number of files in the snapshot.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns true when the snapshot holds no files.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Iterates files in path order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn LazyFile>)> {
		self.entries.iter().map(|(path, file)| (path.as_str(), file))
	}
}

impl fmt::Debug for Files {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_set().entries(self.entries.keys()).finish()
	}
}
