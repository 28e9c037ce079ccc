use std::{
	future::Future,
	pin::Pin,
	sync::Arc,
	task::{Context, Poll},
};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use vigil_matcher::{Candidate, MatchHit, MATCH_THRESHOLD};

use super::error::Error;

/// A unique identifier for a match request using the [`uuid`](https://docs.rs/uuid) crate.
pub type RequestId = Uuid;

/// A unit of matching work: the input descriptor plus an owned candidate
/// snapshot, moved into a worker at dispatch time so no candidate data is
/// ever shared by reference across execution contexts.
#[derive(Debug)]
pub struct MatchRequest {
	pub(crate) descriptor: Vec<f64>,
	pub(crate) candidates: Vec<Candidate>,
	pub(crate) threshold: f64,
}

impl MatchRequest {
	#[must_use]
	pub fn new(descriptor: Vec<f64>, candidates: Vec<Candidate>) -> Self {
		Self {
			descriptor,
			candidates,
			threshold: MATCH_THRESHOLD,
		}
	}

	#[must_use]
	pub fn with_threshold(mut self, threshold: f64) -> Self {
		self.threshold = threshold;
		self
	}
}

/// One element of a batch request, correlated with its result by `index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
	pub index: usize,
	pub descriptor: Vec<f64>,
}

/// A batch of descriptors matched against one shared candidate snapshot,
/// handled by a single worker as a unit.
#[derive(Debug)]
pub struct BatchRequest {
	pub(crate) items: Vec<BatchItem>,
	pub(crate) candidates: Vec<Candidate>,
	pub(crate) threshold: f64,
}

impl BatchRequest {
	#[must_use]
	pub fn new(items: Vec<BatchItem>, candidates: Vec<Candidate>) -> Self {
		Self {
			items,
			candidates,
			threshold: MATCH_THRESHOLD,
		}
	}

	#[must_use]
	pub fn with_threshold(mut self, threshold: f64) -> Self {
		self.threshold = threshold;
		self
	}
}

/// Outcome of one batch item. A failed item never aborts the rest of its
/// batch; the batch result always has exactly one entry per submitted item.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItemOutcome {
	pub index: usize,
	pub outcome: Result<Option<MatchHit>, Error>,
}

#[derive(Debug)]
pub(crate) struct SingleOrder {
	pub id: RequestId,
	pub descriptor: Vec<f64>,
	pub candidates: Vec<Candidate>,
	pub threshold: f64,
}

impl SingleOrder {
	pub fn new(request: MatchRequest) -> Self {
		Self {
			id: RequestId::new_v4(),
			descriptor: request.descriptor,
			candidates: request.candidates,
			threshold: request.threshold,
		}
	}
}

#[derive(Debug)]
pub(crate) struct BatchOrder {
	pub id: RequestId,
	pub items: Vec<BatchItem>,
	// Shared read-only between the per-item runners of one worker, never
	// with the caller.
	pub candidates: Arc<Vec<Candidate>>,
	pub threshold: f64,
}

impl BatchOrder {
	pub fn new(request: BatchRequest) -> Self {
		Self {
			id: RequestId::new_v4(),
			items: request.items,
			candidates: Arc::new(request.candidates),
			threshold: request.threshold,
		}
	}
}

/// A handle returned when a request is submitted to the pool; await it to get
/// the outcome.
#[derive(Debug)]
pub struct TaskHandle<T> {
	pub(crate) request_id: RequestId,
	pub(crate) done_rx: oneshot::Receiver<Result<T, Error>>,
}

impl<T> TaskHandle<T> {
	/// Get the unique identifier of the request.
	#[must_use]
	pub const fn request_id(&self) -> RequestId {
		self.request_id
	}
}

impl<T> Future for TaskHandle<T> {
	type Output = Result<T, Error>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		// The manager resolves every pending request explicitly; a dropped
		// sender can only mean the whole pool was torn down.
		Pin::new(&mut self.done_rx)
			.poll(cx)
			.map(|res| res.unwrap_or(Err(Error::Shutdown)))
	}
}
