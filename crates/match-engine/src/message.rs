use tokio::sync::oneshot;

use vigil_matcher::MatchHit;

use super::{
	error::Error,
	pool::PoolStatus,
	task::{BatchItemOutcome, BatchOrder, RequestId, SingleOrder},
	worker::{WorkerId, WorkerStatus},
};

#[derive(Debug)]
pub(crate) enum PoolMessage {
	NewTask {
		order: SingleOrder,
		done_tx: oneshot::Sender<Result<Option<MatchHit>, Error>>,
	},
	NewBatch {
		order: BatchOrder,
		done_tx: oneshot::Sender<Result<Vec<BatchItemOutcome>, Error>>,
	},
	Completed {
		worker_id: WorkerId,
		request_id: RequestId,
		output: TaskOutput,
	},
	WorkerCrashed {
		worker_id: WorkerId,
	},
	StatusRequest(oneshot::Sender<PoolStatus>),
	ShutdownRequest(oneshot::Sender<()>),
}

#[derive(Debug)]
pub(crate) enum TaskOutput {
	Single(Result<Option<MatchHit>, Error>),
	Batch(Vec<BatchItemOutcome>),
}

#[derive(Debug)]
pub(crate) enum WorkerMessage {
	NewTask(SingleOrder),
	NewBatch(BatchOrder),
	StatusRequest(oneshot::Sender<WorkerStatus>),
	ForceAbort,
	Stop(oneshot::Sender<()>),
}
