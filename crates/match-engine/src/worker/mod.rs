use std::{cell::RefCell, time::Duration};

use async_channel as chan;
use serde::Serialize;
use tokio::{spawn, sync::oneshot, task::JoinHandle, time::timeout};
use tracing::{error, info, instrument, trace, warn, Instrument};

use super::{
	config::PoolConfig,
	error::Error,
	message::WorkerMessage,
	pool::PoolComm,
	task::{BatchOrder, SingleOrder},
};

mod run;

use run::run;

pub type WorkerId = usize;

/// Snapshot of one worker's loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerStatus {
	pub is_running: bool,
	pub queue_length: usize,
	pub is_processing: bool,
}

pub(crate) struct WorkerBuilder {
	id: WorkerId,
	msgs_tx: chan::Sender<WorkerMessage>,
	msgs_rx: chan::Receiver<WorkerMessage>,
}

impl WorkerBuilder {
	pub fn new(id: WorkerId) -> Self {
		let (msgs_tx, msgs_rx) = chan::bounded(8);

		Self {
			id,
			msgs_tx,
			msgs_rx,
		}
	}

	#[instrument(name = "match_engine_worker", skip(self, pool_comm, config), fields(worker_id = self.id))]
	pub fn build(self, pool_comm: PoolComm, config: &PoolConfig) -> Worker {
		let Self {
			id,
			msgs_tx,
			msgs_rx,
		} = self;

		let handle = spawn({
			let config = config.clone();

			async move {
				trace!("Worker message processing task starting...");
				while let Err(e) = spawn(run(
					id,
					pool_comm.clone(),
					msgs_rx.clone(),
					config.clone(),
				))
				.await
				{
					if e.is_panic() {
						error!(?e, "Worker critically failed and will be replaced in place;");
						pool_comm.worker_crashed(id).await;
					} else {
						trace!("Worker received shutdown signal and will exit...");
						break;
					}
				}

				info!("Worker gracefully shutdown");
			}
			.in_current_span()
		});

		Worker {
			id,
			msgs_tx,
			handle: RefCell::new(Some(handle)),
		}
	}
}

/// Handle to a single execution worker: a long-lived spawned task owning its
/// own queue and state, reachable only through typed messages. The outer
/// supervisor task replaces a panicked run loop in place, at the same pool
/// slot, reusing the same mailbox.
#[derive(Debug)]
pub(crate) struct Worker {
	pub id: WorkerId,
	msgs_tx: chan::Sender<WorkerMessage>,
	handle: RefCell<Option<JoinHandle<()>>>,
}

impl Worker {
	pub async fn send_task(&self, order: SingleOrder) -> Result<(), Error> {
		self.msgs_tx
			.send(WorkerMessage::NewTask(order))
			.await
			.map_err(|_| Error::Shutdown)
	}

	pub async fn send_batch(&self, order: BatchOrder) -> Result<(), Error> {
		self.msgs_tx
			.send(WorkerMessage::NewBatch(order))
			.await
			.map_err(|_| Error::Shutdown)
	}

	pub async fn status(&self) -> Result<WorkerStatus, Error> {
		let (tx, rx) = oneshot::channel();

		self.msgs_tx
			.send(WorkerMessage::StatusRequest(tx))
			.await
			.map_err(|_| Error::Shutdown)?;

		rx.await.map_err(|_| Error::Shutdown)
	}

	/// Asks the worker to stop, waiting up to `grace` before forcing
	/// abortion of whatever it is still computing.
	#[instrument(skip(self, grace), fields(worker_id = self.id))]
	pub async fn stop(&self, grace: Duration) {
		if let Some(handle) = self
			.handle
			.try_borrow_mut()
			.ok()
			.and_then(|mut maybe_handle| maybe_handle.take())
		{
			let (tx, rx) = oneshot::channel();

			if self.msgs_tx.send(WorkerMessage::Stop(tx)).await.is_err() {
				warn!("Worker mailbox closed before stop request");
			} else {
				match timeout(grace, rx).await {
					Ok(Ok(())) => {}
					Ok(Err(_)) => warn!("Worker dropped stop ack"),
					Err(_) => {
						warn!("Worker did not stop within the grace period, forcing abortion");
						if self.msgs_tx.send(WorkerMessage::ForceAbort).await.is_err() {
							warn!("Worker mailbox closed before force abort request");
						}
					}
				}
			}

			if let Err(e) = handle.await {
				if e.is_panic() {
					error!("Worker {} critically failed: {e:#?}", self.id);
				}
			}
		} else {
			warn!("Trying to stop a worker that was already stopped");
		}
	}
}

/// SAFETY: Due to usage of refcell we lost `Sync` impl, but we only use it to have a stop method
/// receiving `&self` which is called once, and we also use `try_borrow_mut` so we never panic
unsafe impl Sync for Worker {}
