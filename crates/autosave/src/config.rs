use std::time::Duration;

use crate::error::ConfigError;

/// Scheduling constants for autosave.
///
/// Fixed for the lifetime of an [`crate::EditingCoordinator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoSaveConfig {
	/// Delay between a snapshot change and its local-cache write.
	pub local_persist_delay: Duration,
	/// Delay between a snapshot change and its first cloud-save attempt.
	pub cloud_persist_delay: Duration,
	/// Fixed wait between a failed cloud-save attempt and the next one.
	pub retry_delay: Duration,
}

impl Default for AutoSaveConfig {
	fn default() -> Self {
		Self {
			local_persist_delay: Duration::from_millis(1000),
			cloud_persist_delay: Duration::from_millis(1500),
			retry_delay: Duration::from_millis(5000),
		}
	}
}

impl AutoSaveConfig {
	/// Checks the delays for values the scheduler cannot honor.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.retry_delay.is_zero() {
			return Err(ConfigError::ZeroRetryDelay);
		}
		if self.cloud_persist_delay < self.local_persist_delay {
			return Err(ConfigError::CloudBeforeLocal {
				local: self.local_persist_delay,
				cloud: self.cloud_persist_delay,
			});
		}
		Ok(())
	}
}
