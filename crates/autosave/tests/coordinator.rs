//! Coordinator scenarios on a paused clock.
//!
//! Delays: local 1000 ms, cloud 1500 ms, retry 5000 ms. Checkpoints sit 1 ms
//! after the instant under test so timers due at that instant have fired.

mod common;

use std::time::Duration;

use common::{Harness, KEY};
use pretty_assertions::assert_eq;
use savepoint_autosave::test_helpers::{MockFile, MockProject, advance_ms, offsets_ms, settle};
use savepoint_autosave::{AutoSaveState, EditingMode};
use tokio::time::Instant;

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn single_edit_saves_locally_then_to_cloud() {
	let h = Harness::new(MockProject::new("user").cloud_duration(Duration::from_millis(500)));
	let origin = Instant::now();
	h.editing.start();

	assert_eq!(h.editing.mode(), EditingMode::AutoSave);
	assert_eq!(h.editing.auto_save_state(), AutoSaveState::Saved);
	assert!(!h.editing.is_dirty());

	h.project.edit("file1.txt");
	settle().await;
	assert_eq!(h.editing.auto_save_state(), AutoSaveState::Pending);
	assert!(h.editing.is_dirty());

	advance_ms(1001).await;
	assert_eq!(offsets_ms(origin, &h.project.local_cache_call_times()), vec![1000]);
	assert_eq!(h.project.local_cache_keys(), vec![KEY.to_owned()]);

	advance_ms(500).await;
	assert_eq!(offsets_ms(origin, &h.project.cloud_call_times()), vec![1500]);
	assert_eq!(h.editing.auto_save_state(), AutoSaveState::Saving);

	advance_ms(500).await;
	assert_eq!(h.editing.auto_save_state(), AutoSaveState::Saved);
	assert_eq!(h.storage.cleared_keys(), vec![KEY.to_owned()]);
	assert_eq!(offsets_ms(origin, &h.storage.clear_times()), vec![2000]);
	assert!(!h.editing.is_dirty());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn failed_cloud_saves_trace_states_and_recover() {
	let h = Harness::new(MockProject::new("user").cloud_duration(Duration::from_millis(500)).failing_cloud(2));
	let origin = Instant::now();
	h.editing.start();

	let mut trace = Vec::new();
	h.project.edit("file1.txt");
	settle().await;
	trace.push(h.editing.auto_save_state());

	// Attempts start at 1500, 7000, 12500 and each takes 500 ms.
	for step in [1501, 500, 5000, 500, 5000, 500] {
		advance_ms(step).await;
		trace.push(h.editing.auto_save_state());
	}

	assert_eq!(
		trace,
		vec![
			AutoSaveState::Pending,
			AutoSaveState::Saving,
			AutoSaveState::Failed,
			AutoSaveState::Saving,
			AutoSaveState::Failed,
			AutoSaveState::Saving,
			AutoSaveState::Saved,
		]
	);
	assert_eq!(offsets_ms(origin, &h.project.cloud_call_times()), vec![1500, 7000, 12500]);
	assert_eq!(h.storage.cleared_keys().len(), 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn dispose_cancels_pending_session() {
	let h = Harness::new(MockProject::new("user"));
	h.editing.start();

	h.project.edit("file1.txt");
	settle().await;
	assert_eq!(h.editing.auto_save_state(), AutoSaveState::Pending);

	h.editing.dispose();
	advance_ms(10_000).await;
	assert_eq!(h.project.local_cache_calls(), 0);
	assert_eq!(h.project.cloud_calls(), 0);
	assert_eq!(h.editing.auto_save_state(), AutoSaveState::Saved);

	h.project.edit("file2.txt");
	advance_ms(10_000).await;
	assert_eq!(h.project.cloud_calls(), 0);
	assert!(h.editing.saving().is_none());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn dispose_during_cloud_save_stops_everything() {
	let h = Harness::new(MockProject::new("user").cloud_duration(Duration::from_millis(500)).failing_cloud(1));
	h.editing.start();

	h.project.edit("file1.txt");
	advance_ms(1700).await;
	assert_eq!(h.editing.auto_save_state(), AutoSaveState::Saving);

	h.editing.dispose();
	h.editing.dispose();
	advance_ms(30_000).await;
	assert_eq!(h.project.cloud_calls(), 1);
	assert!(h.storage.cleared_keys().is_empty());
	assert_eq!(h.editing.auto_save_state(), AutoSaveState::Saved);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn edits_inside_local_window_save_once() {
	let h = Harness::new(MockProject::new("user"));
	h.editing.start();

	h.project.edit("file1.txt");
	settle().await;
	let first = h.editing.saving().expect("session for first edit");
	advance_ms(100).await;
	h.project.edit("file2.txt");
	settle().await;
	let second = h.editing.saving().expect("session for second edit");
	advance_ms(100).await;
	h.project.edit("file3.txt");
	settle().await;

	assert!(first.token().is_cancelled());
	assert!(second.token().is_cancelled());
	assert!(first.generation() < second.generation());

	advance_ms(1501).await;
	assert_eq!(h.editing.auto_save_state(), AutoSaveState::Saved);
	assert_eq!(h.project.local_cache_calls(), 1);
	assert_eq!(h.project.cloud_calls(), 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn new_edit_cancels_in_flight_cloud_save() {
	let h = Harness::new(MockProject::new("user").cloud_duration(Duration::from_millis(500)));
	let origin = Instant::now();
	h.editing.start();

	h.project.edit("file1.txt");
	advance_ms(1600).await;
	assert_eq!(h.editing.auto_save_state(), AutoSaveState::Saving);

	h.project.edit("file1.txt");
	settle().await;
	assert_eq!(h.editing.auto_save_state(), AutoSaveState::Pending);

	advance_ms(1000).await;
	assert!(h.storage.cleared_keys().is_empty(), "superseded save must not complete");
	assert_ne!(h.editing.auto_save_state(), AutoSaveState::Failed);

	advance_ms(1001).await;
	assert_eq!(h.editing.auto_save_state(), AutoSaveState::Saved);
	assert_eq!(offsets_ms(origin, &h.project.cloud_call_times()), vec![1500, 3100]);
	assert_eq!(h.storage.cleared_keys().len(), 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn effect_free_mode_never_persists() {
	let h = Harness::with(MockProject::new("project-owner"), Some("different-user"), true);
	h.editing.start();

	assert_eq!(h.editing.mode(), EditingMode::EffectFree);
	assert_eq!(h.editing.auto_save_state(), AutoSaveState::Saved);

	for path in ["file1.txt", "file2.txt", "file1.txt"] {
		h.project.edit(path);
		settle().await;
		assert!(h.editing.saving().is_none());
	}
	advance_ms(30_000).await;

	assert_eq!(h.project.local_cache_calls(), 0);
	assert_eq!(h.project.cloud_calls(), 0);
	assert_eq!(h.editing.auto_save_state(), AutoSaveState::Saved);
	assert!(h.editing.is_dirty());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn mode_follows_signed_in_identity() {
	let h = Harness::with(MockProject::new("user"), None, true);
	h.editing.start();
	assert_eq!(h.editing.mode(), EditingMode::EffectFree);

	h.project.edit("file1.txt");
	advance_ms(3000).await;
	assert_eq!(h.project.cloud_calls(), 0);

	h.signed_in.send_replace(Some("user".to_owned()));
	assert_eq!(h.editing.mode(), EditingMode::AutoSave);

	h.project.edit("file2.txt");
	advance_ms(3000).await;
	assert_eq!(h.project.cloud_calls(), 1);
	assert!(!h.editing.is_dirty());

	h.signed_in.send_replace(None);
	assert_eq!(h.editing.mode(), EditingMode::EffectFree);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn offline_waits_for_reachability() {
	let h = Harness::with(MockProject::new("user").cloud_duration(Duration::from_millis(500)), Some("user"), false);
	h.editing.start();

	h.project.edit("file1.txt");
	settle().await;
	assert_eq!(h.editing.auto_save_state(), AutoSaveState::Pending);

	advance_ms(1001).await;
	assert_eq!(h.project.local_cache_calls(), 1);

	advance_ms(501).await;
	assert_eq!(h.project.cloud_calls(), 0);
	assert_eq!(h.editing.auto_save_state(), AutoSaveState::Pending);

	h.online.send_replace(true);
	settle().await;
	assert_eq!(h.project.cloud_calls(), 1);
	assert_eq!(h.editing.auto_save_state(), AutoSaveState::Saving);

	advance_ms(501).await;
	assert_eq!(h.editing.auto_save_state(), AutoSaveState::Saved);
	assert_eq!(h.project.cloud_calls(), 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn flush_without_session_is_noop() {
	let h = Harness::new(MockProject::new("user"));
	h.editing.start();

	h.editing.flush_saving().await;
	settle().await;
	assert_eq!(h.project.cloud_calls(), 0);
	assert_eq!(h.editing.auto_save_state(), AutoSaveState::Saved);
	assert!(!h.editing.is_dirty());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn flush_saves_immediately_once() {
	let h = Harness::new(MockProject::new("user"));
	let origin = Instant::now();
	h.editing.start();

	h.project.edit("file1.txt");
	settle().await;
	h.editing.flush_saving().await;
	settle().await;
	assert_eq!(offsets_ms(origin, &h.project.cloud_call_times()), vec![0]);
	assert_eq!(h.editing.auto_save_state(), AutoSaveState::Saved);
	assert!(!h.editing.is_dirty());

	advance_ms(10_000).await;
	assert_eq!(h.project.cloud_calls(), 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn start_prefetches_the_existing_snapshot_once() {
	let h = Harness::new(MockProject::new("user"));
	let initial = MockFile::new("initial.txt");
	h.project.edit_with("initial.txt", initial.clone());

	h.editing.start();
	settle().await;
	assert_eq!(initial.loads(), 1);
	assert_eq!(h.editing.auto_save_state(), AutoSaveState::Saved);
	assert!(!h.editing.is_dirty());

	advance_ms(10_000).await;
	assert_eq!(initial.loads(), 1);
	assert_eq!(h.project.cloud_calls(), 0);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn prefetch_warms_each_snapshot_and_tolerates_failures() {
	let h = Harness::new(MockProject::new("user"));
	h.editing.start();

	let broken = MockFile::failing("broken.png");
	let fresh = MockFile::new("fresh.txt");
	h.project.edit_with("broken.png", broken.clone());
	settle().await;
	assert_eq!(broken.loads(), 1);

	h.project.edit_with("fresh.txt", fresh.clone());
	settle().await;
	assert_eq!(broken.loads(), 2);
	assert_eq!(fresh.loads(), 1);
	assert_eq!(h.project.snapshot().len(), 5);

	advance_ms(3000).await;
	assert_eq!(h.project.cloud_calls(), 1);
	assert_eq!(h.editing.auto_save_state(), AutoSaveState::Saved);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn status_subscription_follows_current_session() {
	let h = Harness::new(MockProject::new("user").cloud_duration(Duration::from_millis(500)));
	let mut status = h.editing.subscribe_auto_save_state();
	let mut dirty = h.editing.subscribe_dirty();
	h.editing.start();

	h.project.edit("file1.txt");
	settle().await;
	assert_eq!(*status.borrow_and_update(), AutoSaveState::Pending);
	assert!(*dirty.borrow_and_update());

	advance_ms(1501).await;
	assert_eq!(*status.borrow_and_update(), AutoSaveState::Saving);

	advance_ms(500).await;
	assert_eq!(*status.borrow_and_update(), AutoSaveState::Saved);
	assert!(!*dirty.borrow_and_update());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn cancelling_current_session_clears_it() {
	let h = Harness::new(MockProject::new("user"));
	h.editing.start();

	h.project.edit("file1.txt");
	settle().await;
	let session = h.editing.saving().expect("current session");
	session.cancel();
	settle().await;

	assert!(h.editing.saving().is_none());
	assert_eq!(*h.editing.subscribe_auto_save_state().borrow(), AutoSaveState::Saved);
	advance_ms(10_000).await;
	assert_eq!(h.project.cloud_calls(), 0);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn dropping_coordinator_disposes() {
	let h = Harness::new(MockProject::new("user"));
	h.editing.start();
	h.project.edit("file1.txt");
	settle().await;

	let Harness { project, editing, .. } = h;
	drop(editing);
	advance_ms(10_000).await;
	assert_eq!(project.local_cache_calls(), 0);
	assert_eq!(project.cloud_calls(), 0);
}
