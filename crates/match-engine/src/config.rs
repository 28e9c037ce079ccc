use std::{str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Tunables for the worker pool, overridable from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
	/// Number of execution workers. The pool never runs more simultaneous
	/// computations than this.
	pub worker_count: usize,
	/// Deadline for a single match task.
	pub task_timeout: Duration,
	/// Deadline for each item inside a batch.
	pub batch_item_timeout: Duration,
	/// How long `shutdown` waits for a worker before forcing abortion of its
	/// running task.
	pub shutdown_grace: Duration,
}

impl Default for PoolConfig {
	fn default() -> Self {
		Self {
			worker_count: 2,
			task_timeout: Duration::from_millis(5000),
			batch_item_timeout: Duration::from_millis(3000),
			shutdown_grace: Duration::from_millis(1000),
		}
	}
}

impl PoolConfig {
	/// Reads `VIGIL_WORKER_COUNT`, `VIGIL_TASK_TIMEOUT_MS`,
	/// `VIGIL_BATCH_ITEM_TIMEOUT_MS` and `VIGIL_SHUTDOWN_GRACE_MS`, falling
	/// back to defaults for anything unset or unparsable.
	#[must_use]
	pub fn from_env() -> Self {
		let mut config = Self::default();

		if let Some(count) = env_parse::<usize>("VIGIL_WORKER_COUNT") {
			if count > 0 {
				config.worker_count = count;
			} else {
				warn!("VIGIL_WORKER_COUNT must be at least 1, keeping default");
			}
		}

		if let Some(millis) = env_parse::<u64>("VIGIL_TASK_TIMEOUT_MS") {
			config.task_timeout = Duration::from_millis(millis);
		}

		if let Some(millis) = env_parse::<u64>("VIGIL_BATCH_ITEM_TIMEOUT_MS") {
			config.batch_item_timeout = Duration::from_millis(millis);
		}

		if let Some(millis) = env_parse::<u64>("VIGIL_SHUTDOWN_GRACE_MS") {
			config.shutdown_grace = Duration::from_millis(millis);
		}

		config
	}
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
	let raw = std::env::var(key).ok()?;

	raw.parse().map_or_else(
		|_| {
			warn!(%key, %raw, "Ignoring unparsable environment override");
			None
		},
		Some,
	)
}
