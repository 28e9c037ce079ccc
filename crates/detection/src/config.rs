use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use vigil_matcher::{DEFAULT_MAX_RESULTS, MATCH_THRESHOLD};

/// Matching knobs for the detection façade, overridable from the
/// environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
	/// Maximum Euclidean distance still counted as a match.
	pub match_threshold: f64,
	/// Result cap for similarity listings.
	pub max_results: usize,
}

impl Default for DetectionConfig {
	fn default() -> Self {
		Self {
			match_threshold: MATCH_THRESHOLD,
			max_results: DEFAULT_MAX_RESULTS,
		}
	}
}

impl DetectionConfig {
	/// Reads `VIGIL_MATCH_THRESHOLD` and `VIGIL_MAX_RESULTS`, falling back
	/// to defaults for anything unset, unparsable or out of range.
	#[must_use]
	pub fn from_env() -> Self {
		let mut config = Self::default();

		if let Some(threshold) = env_parse::<f64>("VIGIL_MATCH_THRESHOLD") {
			if threshold.is_finite() && threshold > 0.0 {
				config.match_threshold = threshold;
			} else {
				warn!("VIGIL_MATCH_THRESHOLD must be a positive number, keeping default");
			}
		}

		if let Some(max_results) = env_parse::<usize>("VIGIL_MAX_RESULTS") {
			config.max_results = max_results;
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
