use std::{
	cell::RefCell,
	collections::{HashMap, VecDeque},
	pin::pin,
	sync::Arc,
};

use async_channel as chan;
use futures::StreamExt;
use futures_concurrency::future::Join;
use serde::Serialize;
use tokio::{spawn, sync::oneshot, task::JoinHandle};
use tracing::{error, trace, warn};

use vigil_matcher::MatchHit;

use super::{
	config::PoolConfig,
	error::Error,
	message::{PoolMessage, TaskOutput},
	task::{
		BatchItemOutcome, BatchOrder, BatchRequest, MatchRequest, RequestId, SingleOrder,
		TaskHandle,
	},
	worker::{Worker, WorkerBuilder, WorkerId, WorkerStatus},
};

/// Observability snapshot of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
	pub total_workers: usize,
	pub available_workers: usize,
	pub queued_requests: usize,
	pub pending_requests: usize,
}

/// The worker pool manager.
///
/// Owns a fixed set of execution workers and mediates all access to them
/// through its own message loop: dispatch to a free worker, FIFO overflow
/// queueing when all are busy, pending-future resolution on completion, and
/// in-place replacement of crashed workers. Construct one and pass it around;
/// there is deliberately no process-wide singleton.
pub struct MatchPool {
	workers: Arc<Vec<Worker>>,
	msgs_tx: chan::Sender<PoolMessage>,
	config: PoolConfig,
	handle: RefCell<Option<JoinHandle<()>>>,
}

impl MatchPool {
	#[must_use]
	pub fn new(config: PoolConfig) -> Self {
		let (msgs_tx, msgs_rx) = chan::bounded(8);
		let pool_comm = PoolComm(msgs_tx.clone());

		let workers = Arc::new(
			(0..config.worker_count)
				.map(WorkerBuilder::new)
				.map(|builder| builder.build(pool_comm.clone(), &config))
				.collect::<Vec<_>>(),
		);

		let handle = spawn({
			let workers = Arc::clone(&workers);
			let msgs_rx = msgs_rx.clone();

			async move {
				while let Err(e) = spawn(Self::run(Arc::clone(&workers), msgs_rx.clone())).await {
					if e.is_panic() {
						error!("Match pool manager panicked: {e:#?}");
					} else {
						error!("Match pool manager failed: {e:#?}");
					}
				}
			}
		});

		Self {
			workers,
			msgs_tx,
			config,
			handle: RefCell::new(Some(handle)),
		}
	}

	/// Submits a single match request.
	///
	/// Dispatched immediately if a worker is free, queued FIFO otherwise.
	/// The returned handle resolves on completion, timeout, worker failure
	/// or shutdown; a lost task is never resubmitted by the pool.
	pub async fn submit(
		&self,
		request: MatchRequest,
	) -> Result<TaskHandle<Option<MatchHit>>, Error> {
		let order = SingleOrder::new(request);
		let request_id = order.id;

		let (done_tx, done_rx) = oneshot::channel();

		self.msgs_tx
			.send(PoolMessage::NewTask { order, done_tx })
			.await
			.map_err(|_| Error::Dispatch)?;

		Ok(TaskHandle {
			request_id,
			done_rx,
		})
	}

	/// Submits a batch; one worker processes the whole batch as a unit.
	pub async fn submit_batch(
		&self,
		request: BatchRequest,
	) -> Result<TaskHandle<Vec<BatchItemOutcome>>, Error> {
		let order = BatchOrder::new(request);
		let request_id = order.id;

		let (done_tx, done_rx) = oneshot::channel();

		self.msgs_tx
			.send(PoolMessage::NewBatch { order, done_tx })
			.await
			.map_err(|_| Error::Dispatch)?;

		Ok(TaskHandle {
			request_id,
			done_rx,
		})
	}

	pub async fn status(&self) -> Result<PoolStatus, Error> {
		let (tx, rx) = oneshot::channel();

		self.msgs_tx
			.send(PoolMessage::StatusRequest(tx))
			.await
			.map_err(|_| Error::Dispatch)?;

		rx.await.map_err(|_| Error::Dispatch)
	}

	/// Per-worker introspection passthrough.
	pub async fn worker_status(&self, worker_id: WorkerId) -> Result<WorkerStatus, Error> {
		self.workers
			.get(worker_id)
			.ok_or(Error::WorkerNotFound(worker_id))?
			.status()
			.await
	}

	async fn run(workers: Arc<Vec<Worker>>, msgs_rx: chan::Receiver<PoolMessage>) {
		let mut msg_stream = pin!(msgs_rx);

		let mut slots: Vec<PoolSlot> = workers.iter().map(|_| PoolSlot::default()).collect();
		let mut overflow: VecDeque<QueuedWork> = VecDeque::new();
		let mut pending: HashMap<RequestId, PendingReply> = HashMap::new();

		while let Some(msg) = msg_stream.next().await {
			match msg {
				PoolMessage::NewTask { order, done_tx } => {
					let work = QueuedWork::Single { order, done_tx };

					if let Some(worker_id) = free_slot(&slots) {
						dispatch(&workers, &mut slots, &mut pending, worker_id, work).await;
					} else {
						trace!("All workers busy, queueing match request");
						overflow.push_back(work);
					}
				}

				PoolMessage::NewBatch { order, done_tx } => {
					let work = QueuedWork::Batch { order, done_tx };

					if let Some(worker_id) = free_slot(&slots) {
						dispatch(&workers, &mut slots, &mut pending, worker_id, work).await;
					} else {
						trace!("All workers busy, queueing batch request");
						overflow.push_back(work);
					}
				}

				PoolMessage::Completed {
					worker_id,
					request_id,
					output,
				} => {
					match pending.remove(&request_id) {
						Some(reply) => reply.resolve(request_id, output),
						None => warn!(%request_id, "Completion report for an unknown request"),
					}

					let slot = &mut slots[worker_id];
					slot.busy = false;
					slot.in_flight = None;

					drain_overflow(&workers, &mut slots, &mut overflow, &mut pending).await;
				}

				PoolMessage::WorkerCrashed { worker_id } => {
					let slot = &mut slots[worker_id];
					slot.restarts += 1;

					// The crashed worker's in-flight request would otherwise
					// hang its caller forever; reject it explicitly.
					if let Some(request_id) = slot.in_flight.take() {
						if let Some(reply) = pending.remove(&request_id) {
							reply.reject(Error::WorkerFailure(request_id));
						}
					}

					slot.busy = false;

					warn!(
						worker_id,
						restarts = slot.restarts,
						"Worker crashed and was replaced in place"
					);

					drain_overflow(&workers, &mut slots, &mut overflow, &mut pending).await;
				}

				PoolMessage::StatusRequest(tx) => {
					let status = PoolStatus {
						total_workers: workers.len(),
						available_workers: slots.iter().filter(|slot| !slot.busy).count(),
						queued_requests: overflow.len(),
						pending_requests: pending.len(),
					};

					if tx.send(status).is_err() {
						warn!("Status request channel closed before sending status");
					}
				}

				PoolMessage::ShutdownRequest(tx) => {
					for work in overflow.drain(..) {
						work.reject(Error::Shutdown);
					}

					for (_, reply) in pending.drain() {
						reply.reject(Error::Shutdown);
					}

					if tx.send(()).is_err() {
						warn!("Shutdown request channel closed before ack");
					}

					break;
				}
			}
		}
	}

	/// Broadcasts stop to every worker, waits out the configured grace
	/// period (forcing abortion past it), then drains and rejects whatever
	/// is still queued or pending.
	pub async fn shutdown(&self) {
		if let Some(handle) = self
			.handle
			.try_borrow_mut()
			.ok()
			.and_then(|mut maybe_handle| maybe_handle.take())
		{
			let grace = self.config.shutdown_grace;

			self.workers
				.iter()
				.map(|worker| async move { worker.stop(grace).await })
				.collect::<Vec<_>>()
				.join()
				.await;

			let (tx, rx) = oneshot::channel();

			if self
				.msgs_tx
				.send(PoolMessage::ShutdownRequest(tx))
				.await
				.is_err()
			{
				warn!("Match pool channel closed before shutdown request");
			} else if rx.await.is_err() {
				warn!("Match pool dropped shutdown ack");
			}

			if let Err(e) = handle.await {
				error!("Match pool failed to shutdown on handle await: {e:#?}");
			}
		} else {
			warn!("Trying to shutdown a match pool that was already shutdown");
		}
	}
}

/// SAFETY: Due to usage of refcell we lost `Sync` impl, but we only use it to have a shutdown method
/// receiving `&self` which is called once, and we also use `try_borrow_mut` so we never panic
unsafe impl Sync for MatchPool {}

/// Worker-side sender back into the manager's mailbox.
#[derive(Clone, Debug)]
#[repr(transparent)]
pub(crate) struct PoolComm(chan::Sender<PoolMessage>);

impl PoolComm {
	pub async fn completed(&self, worker_id: WorkerId, request_id: RequestId, output: TaskOutput) {
		self.0
			.send(PoolMessage::Completed {
				worker_id,
				request_id,
				output,
			})
			.await
			.expect("Pool channel closed trying to report completion");
	}

	pub async fn worker_crashed(&self, worker_id: WorkerId) {
		self.0
			.send(PoolMessage::WorkerCrashed { worker_id })
			.await
			.expect("Pool channel closed trying to report worker crash");
	}
}

/// One worker's scheduling state, kept by the manager.
#[derive(Debug, Default)]
struct PoolSlot {
	busy: bool,
	in_flight: Option<RequestId>,
	restarts: u32,
}

enum QueuedWork {
	Single {
		order: SingleOrder,
		done_tx: oneshot::Sender<Result<Option<MatchHit>, Error>>,
	},
	Batch {
		order: BatchOrder,
		done_tx: oneshot::Sender<Result<Vec<BatchItemOutcome>, Error>>,
	},
}

impl QueuedWork {
	fn request_id(&self) -> RequestId {
		match self {
			Self::Single { order, .. } => order.id,
			Self::Batch { order, .. } => order.id,
		}
	}

	fn reject(self, error: Error) {
		let request_id = self.request_id();

		let dropped = match self {
			Self::Single { done_tx, .. } => done_tx.send(Err(error)).is_err(),
			Self::Batch { done_tx, .. } => done_tx.send(Err(error)).is_err(),
		};

		if dropped {
			warn!(%request_id, "Caller went away before rejection could be delivered");
		}
	}
}

enum PendingReply {
	Single(oneshot::Sender<Result<Option<MatchHit>, Error>>),
	Batch(oneshot::Sender<Result<Vec<BatchItemOutcome>, Error>>),
}

impl PendingReply {
	fn resolve(self, request_id: RequestId, output: TaskOutput) {
		match (self, output) {
			(Self::Single(tx), TaskOutput::Single(result)) => {
				if tx.send(result).is_err() {
					warn!(%request_id, "Caller went away before completion could be delivered");
				}
			}
			(Self::Batch(tx), TaskOutput::Batch(outcomes)) => {
				if tx.send(Ok(outcomes)).is_err() {
					warn!(%request_id, "Caller went away before completion could be delivered");
				}
			}
			(reply, _) => {
				error!(%request_id, "Completion output kind mismatch");
				reply.reject(Error::WorkerFailure(request_id));
			}
		}
	}

	fn reject(self, error: Error) {
		let dropped = match self {
			Self::Single(tx) => tx.send(Err(error)).is_err(),
			Self::Batch(tx) => tx.send(Err(error)).is_err(),
		};

		if dropped {
			warn!("Caller went away before rejection could be delivered");
		}
	}
}

fn free_slot(slots: &[PoolSlot]) -> Option<WorkerId> {
	slots.iter().position(|slot| !slot.busy)
}

async fn dispatch(
	workers: &[Worker],
	slots: &mut [PoolSlot],
	pending: &mut HashMap<RequestId, PendingReply>,
	worker_id: WorkerId,
	work: QueuedWork,
) {
	let request_id = work.request_id();

	trace!(%request_id, worker_id, "Dispatching to worker");

	let reply = match work {
		QueuedWork::Single { order, done_tx } => {
			if workers[worker_id].send_task(order).await.is_err() {
				warn!(%request_id, worker_id, "Worker mailbox closed, rejecting request");
				if done_tx.send(Err(Error::Shutdown)).is_err() {
					warn!(%request_id, "Caller went away before rejection could be delivered");
				}
				return;
			}

			PendingReply::Single(done_tx)
		}
		QueuedWork::Batch { order, done_tx } => {
			if workers[worker_id].send_batch(order).await.is_err() {
				warn!(%request_id, worker_id, "Worker mailbox closed, rejecting batch");
				if done_tx.send(Err(Error::Shutdown)).is_err() {
					warn!(%request_id, "Caller went away before rejection could be delivered");
				}
				return;
			}

			PendingReply::Batch(done_tx)
		}
	};

	slots[worker_id].busy = true;
	slots[worker_id].in_flight = Some(request_id);
	pending.insert(request_id, reply);
}

async fn drain_overflow(
	workers: &[Worker],
	slots: &mut [PoolSlot],
	overflow: &mut VecDeque<QueuedWork>,
	pending: &mut HashMap<RequestId, PendingReply>,
) {
	while !overflow.is_empty() {
		let Some(worker_id) = free_slot(slots) else {
			break;
		};

		let Some(work) = overflow.pop_front() else {
			break;
		};

		dispatch(workers, slots, pending, worker_id, work).await;
	}
}
