use thiserror::Error;

use super::{task::RequestId, worker::WorkerId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
	#[error("match task timed out <request_id='{0}'>")]
	Timeout(RequestId),
	#[error("worker failed while processing <request_id='{0}'>")]
	WorkerFailure(RequestId),
	#[error("worker not found <worker_id='{0}'>")]
	WorkerNotFound(WorkerId),
	#[error("pool is shutting down")]
	Shutdown,
	#[error("pool is not accepting requests")]
	Dispatch,
}
