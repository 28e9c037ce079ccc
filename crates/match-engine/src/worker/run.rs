use std::{collections::VecDeque, pin::pin, sync::Arc, time::Duration};

use async_channel as chan;
use futures::StreamExt;
use futures_concurrency::{future::Race, stream::Merge};
use tokio::{
	spawn,
	sync::oneshot,
	task::{JoinError, JoinHandle},
	time::sleep,
};
use tracing::{error, trace, warn};

use vigil_matcher::MatchHit;

use super::{
	super::{
		config::PoolConfig,
		error::Error,
		message::{TaskOutput, WorkerMessage},
		pool::PoolComm,
		scan,
		task::{BatchItemOutcome, BatchOrder, RequestId, SingleOrder},
	},
	WorkerId, WorkerStatus,
};

enum WorkOrder {
	Single(SingleOrder),
	Batch(BatchOrder),
}

struct RunningTask {
	request_id: RequestId,
	abort_tx: Option<oneshot::Sender<()>>,
	handle: JoinHandle<()>,
}

/// The worker's cooperative loop.
///
/// Commands and runner outputs are merged into one stream, so the mailbox
/// stays responsive while a computation is in flight. Only one runner exists
/// at a time (`current`), which is the one-computation-per-worker invariant;
/// the serial loop enforces it without any lock.
pub(super) async fn run(
	id: WorkerId,
	pool_comm: PoolComm,
	msgs_rx: chan::Receiver<WorkerMessage>,
	config: PoolConfig,
) {
	let mut queue = VecDeque::<WorkOrder>::new();
	let mut current: Option<RunningTask> = None;
	let mut stop_ack: Option<oneshot::Sender<()>> = None;

	enum StreamMessage {
		Commands(WorkerMessage),
		TaskOutput((RequestId, TaskOutput)),
	}

	let (runner_tx, runner_rx) = chan::bounded(8);

	let mut msg_stream = pin!((
		msgs_rx.map(StreamMessage::Commands),
		runner_rx.map(StreamMessage::TaskOutput),
	)
		.merge());

	while let Some(msg) = msg_stream.next().await {
		match msg {
			StreamMessage::Commands(WorkerMessage::NewTask(order)) => {
				if stop_ack.is_some() {
					warn!(request_id = %order.id, "Worker is stopping, dropping new task");
					continue;
				}

				queue.push_back(WorkOrder::Single(order));

				if current.is_none() {
					current = start_next(&mut queue, &runner_tx, &config);
				}
			}

			StreamMessage::Commands(WorkerMessage::NewBatch(order)) => {
				if stop_ack.is_some() {
					warn!(request_id = %order.id, "Worker is stopping, dropping new batch");
					continue;
				}

				queue.push_back(WorkOrder::Batch(order));

				if current.is_none() {
					current = start_next(&mut queue, &runner_tx, &config);
				}
			}

			StreamMessage::Commands(WorkerMessage::StatusRequest(tx)) => {
				if tx
					.send(WorkerStatus {
						is_running: stop_ack.is_none(),
						queue_length: queue.len(),
						is_processing: current.is_some(),
					})
					.is_err()
				{
					warn!("Status request channel closed before sending status");
				}
			}

			StreamMessage::Commands(WorkerMessage::ForceAbort) => {
				if let Some(running) = current.as_mut() {
					if let Some(abort_tx) = running.abort_tx.take() {
						if abort_tx.send(()).is_err() {
							warn!(
								request_id = %running.request_id,
								"Task finished before abort signal could be delivered"
							);
						}
					}
				}
			}

			StreamMessage::Commands(WorkerMessage::Stop(tx)) => {
				if current.is_none() {
					trace!("Worker idle, stopping immediately");
					if tx.send(()).is_err() {
						warn!("Stop request channel closed before ack");
					}
					return;
				}

				trace!("Worker draining current task before stopping");
				stop_ack = Some(tx);
			}

			StreamMessage::TaskOutput((request_id, output)) => {
				pool_comm.completed(id, request_id, output).await;

				join_current(&mut current, request_id).await;

				if let Some(tx) = stop_ack.take() {
					if !queue.is_empty() {
						warn!(
							dropped = queue.len(),
							"Worker stopping with queued tasks, dropping them"
						);
					}
					if tx.send(()).is_err() {
						warn!("Stop request channel closed before ack");
					}
					return;
				}

				current = start_next(&mut queue, &runner_tx, &config);
			}
		}
	}
}

async fn join_current(current: &mut Option<RunningTask>, request_id: RequestId) {
	let RunningTask {
		request_id: running_id,
		handle,
		..
	} = current
		.take()
		.expect("Runner output received with no running task");

	assert_eq!(request_id, running_id, "Runner output id mismatch");

	if let Err(e) = handle.await {
		error!("Match runner <request_id='{running_id}'> failed to join: {e:#?}");
	}
}

fn start_next(
	queue: &mut VecDeque<WorkOrder>,
	runner_tx: &chan::Sender<(RequestId, TaskOutput)>,
	config: &PoolConfig,
) -> Option<RunningTask> {
	queue.pop_front().map(|order| {
		let (abort_tx, abort_rx) = oneshot::channel();

		match order {
			WorkOrder::Single(order) => RunningTask {
				request_id: order.id,
				abort_tx: Some(abort_tx),
				handle: spawn(run_single_match(
					order,
					runner_tx.clone(),
					config.task_timeout,
					abort_rx,
				)),
			},
			WorkOrder::Batch(order) => RunningTask {
				request_id: order.id,
				abort_tx: Some(abort_tx),
				handle: spawn(run_batch(
					order,
					runner_tx.clone(),
					config.batch_item_timeout,
					abort_rx,
				)),
			},
		}
	})
}

enum RaceOutput<T> {
	Completed(Result<T, JoinError>),
	Deadline,
	Abort,
}

/// Races a spawned computation against its deadline and the worker's abort
/// signal. Whichever loses is not merely ignored: the computation's join
/// handle is aborted, so the losing scan is dropped at its next yield point
/// instead of burning CPU in the background.
async fn race_computation<T: Send + 'static>(
	handle: JoinHandle<T>,
	deadline: Duration,
	abort_rx: &mut oneshot::Receiver<()>,
) -> RaceOutput<T> {
	let abort_handle = handle.abort_handle();

	let output = (
		async { RaceOutput::Completed(handle.await) },
		async {
			sleep(deadline).await;
			RaceOutput::Deadline
		},
		async {
			abort_rx
				.await
				.expect("Abort channel closed while task is running");
			RaceOutput::Abort
		},
	)
		.race()
		.await;

	if !matches!(output, RaceOutput::Completed(_)) {
		abort_handle.abort();
	}

	output
}

async fn run_single_match(
	order: SingleOrder,
	runner_tx: chan::Sender<(RequestId, TaskOutput)>,
	deadline: Duration,
	mut abort_rx: oneshot::Receiver<()>,
) {
	let SingleOrder {
		id: request_id,
		descriptor,
		candidates,
		threshold,
	} = order;

	let handle = spawn(async move { scan::find_best_match(&descriptor, &candidates, threshold).await });

	let result = match race_computation(handle, deadline, &mut abort_rx).await {
		RaceOutput::Completed(Ok(hit)) => Ok(hit),
		RaceOutput::Completed(Err(join_error)) => {
			error!("Match computation <request_id='{request_id}'> failed to join: {join_error:#?}");
			Err(Error::WorkerFailure(request_id))
		}
		RaceOutput::Deadline => {
			warn!(%request_id, "Match task timed out, computation aborted");
			Err(Error::Timeout(request_id))
		}
		RaceOutput::Abort => {
			warn!(%request_id, "Match task aborted on worker stop");
			Err(Error::Shutdown)
		}
	};

	runner_tx
		.send((request_id, TaskOutput::Single(result)))
		.await
		.expect("Task runner channel closed while sending match output");
}

async fn run_batch(
	order: BatchOrder,
	runner_tx: chan::Sender<(RequestId, TaskOutput)>,
	item_deadline: Duration,
	mut abort_rx: oneshot::Receiver<()>,
) {
	let BatchOrder {
		id: request_id,
		items,
		candidates,
		threshold,
	} = order;

	let total = items.len();
	let mut outcomes = Vec::with_capacity(total);
	let mut aborted = false;

	// Items run independently and in submitted order; one item timing out or
	// failing never aborts the rest.
	for item in items {
		if aborted {
			outcomes.push(BatchItemOutcome {
				index: item.index,
				outcome: Err(Error::Shutdown),
			});
			continue;
		}

		let index = item.index;
		let descriptor = item.descriptor;
		let snapshot = Arc::clone(&candidates);

		let handle: JoinHandle<Option<MatchHit>> =
			spawn(async move { scan::find_best_match(&descriptor, &snapshot, threshold).await });

		let outcome = match race_computation(handle, item_deadline, &mut abort_rx).await {
			RaceOutput::Completed(Ok(hit)) => Ok(hit),
			RaceOutput::Completed(Err(join_error)) => {
				error!(
					"Batch item computation <request_id='{request_id}', index={index}> failed to join: {join_error:#?}"
				);
				Err(Error::WorkerFailure(request_id))
			}
			RaceOutput::Deadline => {
				warn!(%request_id, index, "Batch item timed out, computation aborted");
				Err(Error::Timeout(request_id))
			}
			RaceOutput::Abort => {
				warn!(%request_id, index, "Batch aborted on worker stop");
				aborted = true;
				Err(Error::Shutdown)
			}
		};

		outcomes.push(BatchItemOutcome { index, outcome });
	}

	trace!(%request_id, total, "Batch processed");

	runner_tx
		.send((request_id, TaskOutput::Batch(outcomes)))
		.await
		.expect("Task runner channel closed while sending batch output");
}
