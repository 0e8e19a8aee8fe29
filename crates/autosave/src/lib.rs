//! Autosave coordination for edited projects.
//!
//! # Purpose
//!
//! - Decide, for every change to a project's file snapshot, whether to persist it, to which tier (local cache or durable store), when, and with what cancellation and retry discipline.
//! - Expose a dirty flag, an [`AutoSaveState`] projection and a manual flush to the surrounding editor.
//! - Exclude payload shapes, wire formats and diffing; those belong to the [`EditableProject`] and [`LocalStorage`] implementations.
//!
//! # Mental model
//!
//! - The project publishes [`Files`] snapshots on a `watch` channel. A new value is a change; contents are never inspected by autosave.
//! - Each change in [`EditingMode::AutoSave`] gets one [`SavingSession`] bound to a fresh generation token. The previous session's token is cancelled first.
//! - A session runs two independent tiers: a delayed local-cache write (best effort) and a delayed, online-gated cloud save that retries forever with a fixed delay.
//! - Cancellation is the normal end of a superseded session and is never surfaced as a failure.
//!
//! # Key types
//!
//! | Type | Meaning | Constraints | Constructed / mutated in |
//! |---|---|---|---|
//! | [`EditingCoordinator`] | Per-project watcher and session owner | MUST hold at most one current session | `EditingCoordinator::start`, `EditingCoordinator::dispose` |
//! | [`SavingSession`] | One persistence lifecycle for one snapshot | MUST own its token exclusively; MUST have at most one cloud attempt in flight | `SavingSession::start`, `SavingSession::save_to_cloud` |
//! | [`SavingState`] | Cloud-tier progress of one session | `Pending` -> `InProgress` -> `Completed`, or `InProgress` -> `Failed` -> `InProgress` | `SavingSession::save_to_cloud` |
//! | [`AutoSaveState`] | Display projection | `Saved` when no current session | `EditingCoordinator::auto_save_state` |
//! | [`EditingMode`] | Whether edits are persisted | `EffectFree` unless the signed-in identity owns the project | [`resolve_mode`] |
//! | [`AutoSaveConfig`] | Scheduling delays | Fixed per coordinator; validated by `new_with_config` | `AutoSaveConfig::default` |
//!
//! # Invariants
//!
//! 1. The outgoing session's token MUST be cancelled before the incoming session is created.
//!    - Enforced in: `Shared::on_snapshot_changed`
//!    - Tested by: `tests/coordinator.rs::edits_inside_local_window_save_once`, `tests/coordinator.rs::new_edit_cancels_in_flight_cloud_save`
//!    - Failure symptom: two sessions race to the durable store; an older snapshot can overwrite a newer one.
//!
//! 2. Cancellation MUST NOT change session state, be retried, or be logged above trace.
//!    - Enforced in: `SavingSession::attempt_cloud_save`, `SavingSession::persist_locally`
//!    - Tested by: `session::tests::cancel_during_cloud_save_is_not_a_failure`
//!    - Failure symptom: the UI shows "retrying" for a save that was merely superseded.
//!
//! 3. Local-cache failures MUST be logged and MUST NOT be retried within the session or affect state.
//!    - Enforced in: `SavingSession::persist_locally`
//!    - Tested by: `session::tests::local_cache_failure_is_not_retried_and_cloud_proceeds`
//!    - Failure symptom: a full local cache blocks or delays cloud saves.
//!
//! 4. Cloud failures MUST retry after exactly `retry_delay` until success or cancellation.
//!    - Enforced in: `SavingSession::save_to_cloud`, `SavingSession::retry_cloud_save`
//!    - Tested by: `session::tests::retries_with_fixed_delay_until_success`, `tests/coordinator.rs::failed_cloud_saves_trace_states_and_recover`
//!    - Failure symptom: transient outages lose work, or retries hammer the backend.
//!
//! 5. `EffectFree` mode MUST never create a session.
//!    - Enforced in: `Shared::on_snapshot_changed`
//!    - Tested by: `tests/coordinator.rs::effect_free_mode_never_persists`
//!    - Failure symptom: a visitor's edits overwrite the owner's project.
//!
//! 6. After dispose no scheduled action MUST fire.
//!    - Enforced in: `Shared::dispose` (root token is the parent of every session and prefetch token)
//!    - Tested by: `tests/coordinator.rs::dispose_cancels_pending_session`
//!    - Failure symptom: a closed editor keeps writing to the store.
//!
//! # Data flow
//!
//! 1. Snapshot change: the watcher marks the coordinator dirty, cancels the current session and, in `AutoSave`, creates and starts a new one.
//! 2. Local tier: after `local_persist_delay`, `save_to_local_cache(key, token)`; failures logged at warn.
//! 3. Cloud tier: after `cloud_persist_delay`, wait for the online signal, then `save_to_cloud(token)`.
//! 4. Success: state `Completed`, local-cache entry erased in the background, dirty cleared.
//! 5. Failure: state `Failed`, error logged, retry after `retry_delay`.
//!
//! # Concurrency and ordering
//!
//! - The current-session slot is mutated under a short, non-async lock by the snapshot watcher, session monitors and dispose; no lock is held across an await.
//! - Snapshot changes are processed in order by a single watcher task. Changes published faster than the watcher runs coalesce into the newest snapshot.
//! - Every suspension point (delays, the online gate, store calls) is raced against the session token.

mod config;
mod coordinator;
mod error;
mod files;
mod mode;
mod prefetch;
mod project;
mod session;

#[doc(hidden)]
pub mod test_helpers;

pub use config::AutoSaveConfig;
pub use coordinator::{AutoSaveState, EditingCoordinator};
pub use error::{AutoSaveError, BoxError, ConfigError, StoreError};
pub use files::{Files, LazyFile};
pub use mode::{EditingMode, resolve_mode};
pub use project::{EditableProject, LocalStorage};
pub use savepoint_worker::{Cancelled, GenerationToken};
pub use session::{SavingSession, SavingState};
