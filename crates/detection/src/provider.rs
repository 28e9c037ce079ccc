use async_trait::async_trait;

use vigil_matcher::Candidate;

/// Boxed error returned by candidate providers; what went wrong inside the
/// store stays behind the seam.
pub type ProviderError = Box<dyn std::error::Error + Send + Sync>;

/// Source of the read-only candidate snapshot, loaded fresh for every
/// detection call.
#[async_trait]
pub trait CandidateProvider: Send + Sync {
	async fn load_candidates(&self) -> Result<Vec<Candidate>, ProviderError>;
}
