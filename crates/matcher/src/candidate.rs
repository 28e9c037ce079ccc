use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Risk classification attached to a known person.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RiskLevel {
	Low,
	#[default]
	Medium,
	High,
}

/// A known person eligible for matching, loaded as a read-only snapshot.
///
/// A candidate with no descriptor is excluded from all matching: it is never
/// compared and can never produce a spurious zero-distance hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
	pub id: Uuid,
	pub name: String,
	pub crime_type: String,
	pub risk_level: RiskLevel,
	pub image_url: Option<String>,
	pub descriptor: Option<Vec<f64>>,
}

/// Display metadata of a matched candidate, carried inside a match hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRef {
	pub id: Uuid,
	pub name: String,
	pub crime_type: String,
	pub risk_level: RiskLevel,
	pub image_url: Option<String>,
}

impl From<&Candidate> for CandidateRef {
	fn from(candidate: &Candidate) -> Self {
		Self {
			id: candidate.id,
			name: candidate.name.clone(),
			crime_type: candidate.crime_type.clone(),
			risk_level: candidate.risk_level,
			image_url: candidate.image_url.clone(),
		}
	}
}
