//! Cooperative candidate scanning.
//!
//! The worker-side counterpart of the pure matcher: same strict-threshold,
//! first-wins search, but expressed as a future that yields back to the
//! runtime every [`YIELD_EVERY`] comparisons (including before the first
//! one). The yield points keep a worker's housekeeping responsive during
//! large scans and give deadline and abort signals somewhere to land.

use tokio::task::yield_now;

use vigil_matcher::{euclidean_distance, Candidate, MatchHit};

const YIELD_EVERY: usize = 100;

pub(crate) async fn find_best_match(
	descriptor: &[f64],
	candidates: &[Candidate],
	threshold: f64,
) -> Option<MatchHit> {
	let mut best: Option<(f64, usize)> = None;

	for (idx, candidate) in candidates.iter().enumerate() {
		if idx % YIELD_EVERY == 0 {
			yield_now().await;
		}

		let Some(known) = candidate.descriptor.as_deref() else {
			continue;
		};

		let distance = euclidean_distance(descriptor, known);

		if distance < threshold && best.map_or(true, |(best_distance, _)| distance < best_distance)
		{
			best = Some((distance, idx));
		}
	}

	best.map(|(distance, idx)| MatchHit::new(&candidates[idx], distance, threshold))
}

#[cfg(test)]
mod tests {
	use super::*;
	use uuid::Uuid;
	use vigil_matcher::{RiskLevel, DESCRIPTOR_DIMENSIONS, MATCH_THRESHOLD};

	fn candidate(name: &str, first_dim: f64) -> Candidate {
		let mut descriptor = vec![0.0; DESCRIPTOR_DIMENSIONS];
		descriptor[0] = first_dim;

		Candidate {
			id: Uuid::new_v4(),
			name: name.to_string(),
			crime_type: "theft".to_string(),
			risk_level: RiskLevel::Low,
			image_url: None,
			descriptor: Some(descriptor),
		}
	}

	#[tokio::test]
	async fn agrees_with_the_pure_matcher() {
		let input = vec![0.0; DESCRIPTOR_DIMENSIONS];
		let candidates = (0..350)
			.map(|i| candidate(&format!("candidate-{i}"), 0.9))
			.chain(std::iter::once(candidate("target", 0.25)))
			.collect::<Vec<_>>();

		let cooperative = find_best_match(&input, &candidates, MATCH_THRESHOLD).await;
		let pure = vigil_matcher::find_best_match(&input, &candidates, MATCH_THRESHOLD);

		assert_eq!(cooperative, pure);
		assert_eq!(cooperative.unwrap().candidate.name, "target");
	}

	#[tokio::test]
	async fn empty_snapshot_finds_nothing() {
		let input = vec![0.0; DESCRIPTOR_DIMENSIONS];

		assert!(find_best_match(&input, &[], MATCH_THRESHOLD).await.is_none());
	}
}
