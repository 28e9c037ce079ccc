//! Pure face descriptor matching.
//!
//! Everything in this crate is stateless and synchronous: descriptors come in,
//! distances and match hits come out. There is no shared state, so every
//! function here is safe to call concurrently without synchronization. The
//! execution engine (`vigil-match-engine`) builds on these primitives to run
//! large scans off the request path.

mod candidate;
mod matching;

pub use candidate::{Candidate, CandidateRef, RiskLevel};
pub use matching::{
	check_match, euclidean_distance, find_all_matches, find_best_match, round_to, validate,
	MatchCheck, MatchHit, ShapeError, DEFAULT_MAX_RESULTS, DESCRIPTOR_DIMENSIONS, MATCH_THRESHOLD,
};
