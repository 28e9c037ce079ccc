use thiserror::Error;

use vigil_matcher::ShapeError;

use super::provider::ProviderError;

#[derive(Debug, Error)]
pub enum DetectionError {
	#[error(transparent)]
	Shape(#[from] ShapeError),
	#[error("invalid descriptor at index {index}: {source}")]
	BatchItemShape { index: usize, source: ShapeError },
	#[error("candidate provider failed: {0}")]
	Provider(ProviderError),
	#[error(transparent)]
	Engine(#[from] vigil_match_engine::Error),
}
