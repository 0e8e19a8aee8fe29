//! Shared fixture for coordinator scenarios.

use std::sync::Arc;
use std::time::Duration;

use savepoint_autosave::test_helpers::{MockLocalStorage, MockProject};
use savepoint_autosave::{AutoSaveConfig, EditingCoordinator};
use tokio::sync::watch;

pub const KEY: &str = "LOCAL_CACHE_KEY";

/// A coordinator wired to in-memory collaborators.
pub struct Harness {
	pub project: Arc<MockProject>,
	pub storage: Arc<MockLocalStorage>,
	pub online: watch::Sender<bool>,
	pub signed_in: watch::Sender<Option<String>>,
	pub editing: EditingCoordinator,
}

impl Harness {
	/// Owner and signed-in user are both `user`, online.
	pub fn new(project: MockProject) -> Self {
		Self::with(project, Some("user"), true)
	}

	pub fn with(project: MockProject, signed_in: Option<&str>, online: bool) -> Self {
		let _ = tracing_subscriber::fmt().with_test_writer().try_init();
		let project = Arc::new(project);
		let storage = Arc::new(MockLocalStorage::new());
		let online = watch::Sender::new(online);
		let signed_in = watch::Sender::new(signed_in.map(str::to_owned));
		let editing = EditingCoordinator::new_with_config(
			project.clone(),
			storage.clone(),
			online.subscribe(),
			signed_in.subscribe(),
			KEY,
			AutoSaveConfig {
				local_persist_delay: Duration::from_millis(1000),
				cloud_persist_delay: Duration::from_millis(1500),
				retry_delay: Duration::from_millis(5000),
			},
		)
		.expect("valid config");
		Self {
			project,
			storage,
			online,
			signed_in,
			editing,
		}
	}
}
