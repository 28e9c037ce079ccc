use tracing::{error, instrument};

use vigil_match_engine::{BatchItem, BatchRequest, MatchPool, MatchRequest, PoolStatus};
use vigil_matcher::{find_all_matches, find_best_match, validate, Candidate, MatchHit};

use super::{
	config::DetectionConfig,
	error::DetectionError,
	provider::CandidateProvider,
	response::{BatchEntry, DetectionResponse},
};

/// The detection entry points consumed by the platform's outer layers.
///
/// Holds its own pool reference instead of reaching for process-wide state,
/// so tests and embedders can construct isolated instances.
pub struct DetectionService<P> {
	provider: P,
	pool: MatchPool,
	config: DetectionConfig,
}

impl<P: CandidateProvider> DetectionService<P> {
	pub fn new(provider: P, pool: MatchPool, config: DetectionConfig) -> Self {
		Self {
			provider,
			pool,
			config,
		}
	}

	/// Matches one descriptor against the current candidate snapshot.
	///
	/// An empty snapshot is a successful no-match, not an error. With
	/// `use_worker` the scan runs on the pool; any pool-path failure falls
	/// back to a direct in-context scan, which is slower for the request
	/// handler but always correct.
	#[instrument(skip(self, descriptor), fields(dimensions = descriptor.len()))]
	pub async fn detect_face(
		&self,
		descriptor: Vec<f64>,
		use_worker: bool,
	) -> Result<DetectionResponse, DetectionError> {
		validate(&descriptor)?;

		let candidates = self.load().await?;

		if candidates.is_empty() {
			return Ok(DetectionResponse::no_match("No candidates in database"));
		}

		let hit = if use_worker {
			self.pooled_best_match(descriptor, candidates).await
		} else {
			find_best_match(&descriptor, &candidates, self.config.match_threshold)
		};

		Ok(hit.map_or_else(
			|| DetectionResponse::no_match("No match found"),
			DetectionResponse::matched,
		))
	}

	/// Matches a batch of descriptors (video frames, typically) in one pool
	/// task. Every descriptor is validated up front; the result is always
	/// index-aligned with the input.
	#[instrument(skip(self, items), fields(items = items.len()))]
	pub async fn detect_batch(
		&self,
		items: Vec<BatchItem>,
	) -> Result<Vec<BatchEntry>, DetectionError> {
		for item in &items {
			validate(&item.descriptor).map_err(|source| DetectionError::BatchItemShape {
				index: item.index,
				source,
			})?;
		}

		let candidates = self.load().await?;

		let handle = self
			.pool
			.submit_batch(
				BatchRequest::new(items, candidates).with_threshold(self.config.match_threshold),
			)
			.await?;

		Ok(handle.await?.into_iter().map(Into::into).collect())
	}

	/// Lists every candidate under the threshold, closest first, capped by
	/// the configured result limit.
	#[instrument(skip(self, descriptor), fields(dimensions = descriptor.len()))]
	pub async fn find_similar(&self, descriptor: Vec<f64>) -> Result<Vec<MatchHit>, DetectionError> {
		validate(&descriptor)?;

		let candidates = self.load().await?;

		Ok(find_all_matches(
			&descriptor,
			&candidates,
			self.config.match_threshold,
			self.config.max_results,
		))
	}

	pub async fn worker_status(&self) -> Result<PoolStatus, DetectionError> {
		Ok(self.pool.status().await?)
	}

	pub async fn shutdown(&self) {
		self.pool.shutdown().await;
	}

	async fn pooled_best_match(
		&self,
		descriptor: Vec<f64>,
		candidates: Vec<Candidate>,
	) -> Option<MatchHit> {
		let request = MatchRequest::new(descriptor.clone(), candidates.clone())
			.with_threshold(self.config.match_threshold);

		match self.pool.submit(request).await {
			Ok(handle) => match handle.await {
				Ok(hit) => hit,
				Err(e) => {
					error!(%e, "Worker matching failed, falling back to direct matching");
					find_best_match(&descriptor, &candidates, self.config.match_threshold)
				}
			},
			Err(e) => {
				error!(%e, "Pool submission failed, falling back to direct matching");
				find_best_match(&descriptor, &candidates, self.config.match_threshold)
			}
		}
	}

	async fn load(&self) -> Result<Vec<Candidate>, DetectionError> {
		self.provider
			.load_candidates()
			.await
			.map_err(DetectionError::Provider)
	}
}
