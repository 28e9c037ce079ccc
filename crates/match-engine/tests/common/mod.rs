use rand::Rng;
use uuid::Uuid;
use vigil_matcher::{Candidate, RiskLevel, DESCRIPTOR_DIMENSIONS};

pub fn zero_descriptor() -> Vec<f64> {
	vec![0.0; DESCRIPTOR_DIMENSIONS]
}

pub fn descriptor_at(first_dim: f64) -> Vec<f64> {
	let mut descriptor = vec![0.0; DESCRIPTOR_DIMENSIONS];
	descriptor[0] = first_dim;
	descriptor
}

pub fn candidate(name: &str, first_dim: f64) -> Candidate {
	Candidate {
		id: Uuid::new_v4(),
		name: name.to_string(),
		crime_type: "robbery".to_string(),
		risk_level: RiskLevel::High,
		image_url: None,
		descriptor: Some(descriptor_at(first_dim)),
	}
}

/// A snapshot of `size` candidates that are all comfortably above the match
/// threshold, plus one qualifying target appended at the end. Big enough to
/// keep a worker busy for a little while.
pub fn large_snapshot(size: usize, target_name: &str, target_dim: f64) -> Vec<Candidate> {
	let mut rng = rand::thread_rng();

	let mut candidates = (0..size)
		.map(|i| candidate(&format!("nobody-{i}"), rng.gen_range(0.7..1.0)))
		.collect::<Vec<_>>();

	candidates.push(candidate(target_name, target_dim));

	candidates
}
