//! Distance, thresholding and candidate search.

use serde::Serialize;
use thiserror::Error;

use super::candidate::{Candidate, CandidateRef};

/// Number of dimensions every face descriptor must have.
pub const DESCRIPTOR_DIMENSIONS: usize = 128;

/// Maximum Euclidean distance still counted as a match.
pub const MATCH_THRESHOLD: f64 = 0.6;

/// Default result cap for [`find_all_matches`].
pub const DEFAULT_MAX_RESULTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
	#[error("Descriptor must have {DESCRIPTOR_DIMENSIONS} dimensions, got {got}")]
	Dimensions { got: usize },
	#[error("Invalid value at index {index}")]
	InvalidValue { index: usize },
}

/// Outcome of comparing one descriptor against one other descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchCheck {
	pub is_match: bool,
	pub distance: f64,
	pub confidence: f64,
}

/// A candidate that qualified under the threshold, with reported distance
/// rounded to 4 decimal places and confidence to 2.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchHit {
	pub candidate: CandidateRef,
	pub distance: f64,
	pub confidence: f64,
}

impl MatchHit {
	/// Builds a hit from a full-precision distance, rounding only the
	/// reported values.
	pub fn new(candidate: &Candidate, distance: f64, threshold: f64) -> Self {
		Self {
			candidate: candidate.into(),
			distance: round_to(distance, 4),
			confidence: round_to(confidence_for(distance, threshold), 2),
		}
	}
}

/// Rejects anything that is not a sequence of exactly
/// [`DESCRIPTOR_DIMENSIONS`] finite numbers.
///
/// Every entry point must validate before queueing any work.
pub fn validate(descriptor: &[f64]) -> Result<(), ShapeError> {
	if descriptor.len() != DESCRIPTOR_DIMENSIONS {
		return Err(ShapeError::Dimensions {
			got: descriptor.len(),
		});
	}

	if let Some(index) = descriptor.iter().position(|value| !value.is_finite()) {
		return Err(ShapeError::InvalidValue { index });
	}

	Ok(())
}

/// Euclidean distance between two descriptors.
///
/// Length mismatches return `f64::INFINITY` instead of failing; callers treat
/// an infinite distance as "never matches".
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
	if a.len() != b.len() {
		return f64::INFINITY;
	}

	a.iter()
		.zip(b)
		.map(|(x, y)| {
			let diff = x - y;
			diff * diff
		})
		.sum::<f64>()
		.sqrt()
}

/// Compares two descriptors under `threshold` (strict `<`).
pub fn check_match(a: &[f64], b: &[f64], threshold: f64) -> MatchCheck {
	let distance = euclidean_distance(a, b);
	let is_match = distance < threshold;

	let confidence = if is_match {
		confidence_for(distance, threshold)
	} else {
		0.0
	};

	MatchCheck {
		is_match,
		distance: round_to(distance, 4),
		confidence: round_to(confidence, 2),
	}
}

/// Single pass over the snapshot, keeping the smallest distance strictly
/// below `threshold`.
///
/// The running-best comparison is strict too, so the first of two
/// equal-distance candidates wins. Candidates without a descriptor are
/// skipped. Returns `None` for an empty snapshot or when nothing qualifies.
pub fn find_best_match(
	descriptor: &[f64],
	candidates: &[Candidate],
	threshold: f64,
) -> Option<MatchHit> {
	let mut best: Option<(f64, &Candidate)> = None;

	for candidate in candidates {
		let Some(known) = candidate.descriptor.as_deref() else {
			continue;
		};

		let distance = euclidean_distance(descriptor, known);

		if distance < threshold && best.map_or(true, |(best_distance, _)| distance < best_distance)
		{
			best = Some((distance, candidate));
		}
	}

	best.map(|(distance, candidate)| MatchHit::new(candidate, distance, threshold))
}

/// Collects every qualifying candidate, sorted by ascending full-precision
/// distance (so descending confidence), truncated to `max_results`.
pub fn find_all_matches(
	descriptor: &[f64],
	candidates: &[Candidate],
	threshold: f64,
	max_results: usize,
) -> Vec<MatchHit> {
	let mut qualifying = candidates
		.iter()
		.filter_map(|candidate| {
			let known = candidate.descriptor.as_deref()?;
			let distance = euclidean_distance(descriptor, known);
			(distance < threshold).then_some((distance, candidate))
		})
		.collect::<Vec<_>>();

	qualifying.sort_by(|(a, _), (b, _)| a.total_cmp(b));
	qualifying.truncate(max_results);

	qualifying
		.into_iter()
		.map(|(distance, candidate)| MatchHit::new(candidate, distance, threshold))
		.collect()
}

/// Normalized closeness score: 100 at distance 0, 0 at the threshold and
/// beyond.
fn confidence_for(distance: f64, threshold: f64) -> f64 {
	((1.0 - distance / threshold) * 100.0).clamp(0.0, 100.0)
}

/// Rounds to `places` decimal places for external reporting.
pub fn round_to(value: f64, places: i32) -> f64 {
	let factor = 10f64.powi(places);
	(value * factor).round() / factor
}
