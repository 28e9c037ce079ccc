use serde::Serialize;
use uuid::Uuid;

use vigil_match_engine::BatchItemOutcome;
use vigil_matcher::{MatchHit, RiskLevel};

/// API-facing record of the matched person.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedPerson {
	pub id: Uuid,
	pub name: String,
	pub crime_type: String,
	pub risk_level: RiskLevel,
	pub image_url: Option<String>,
	pub confidence: f64,
	pub distance: f64,
}

impl From<MatchHit> for MatchedPerson {
	fn from(hit: MatchHit) -> Self {
		Self {
			id: hit.candidate.id,
			name: hit.candidate.name,
			crime_type: hit.candidate.crime_type,
			risk_level: hit.candidate.risk_level,
			image_url: hit.candidate.image_url,
			confidence: hit.confidence,
			distance: hit.distance,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResponse {
	#[serde(rename = "match")]
	pub matched: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub result: Option<MatchedPerson>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
}

impl DetectionResponse {
	pub(crate) fn matched(hit: MatchHit) -> Self {
		Self {
			matched: true,
			result: Some(hit.into()),
			message: None,
		}
	}

	pub(crate) fn no_match(message: &str) -> Self {
		Self {
			matched: false,
			result: None,
			message: Some(message.to_string()),
		}
	}
}

/// One entry of a batch detection result, index-aligned with the submitted
/// items. A failed item carries its error as text instead of aborting the
/// whole batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchEntry {
	pub index: usize,
	pub success: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub result: Option<MatchedPerson>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl From<BatchItemOutcome> for BatchEntry {
	fn from(item: BatchItemOutcome) -> Self {
		match item.outcome {
			Ok(hit) => Self {
				index: item.index,
				success: true,
				result: hit.map(Into::into),
				error: None,
			},
			Err(e) => Self {
				index: item.index,
				success: false,
				result: None,
				error: Some(e.to_string()),
			},
		}
	}
}
