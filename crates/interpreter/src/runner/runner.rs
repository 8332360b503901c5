//! The interpreter engine: driver loop and worker pool

use crossbeam::deque::Worker as WorkerQueue;
use std::{
	sync::{
		atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering},
		Arc, Mutex,
	},
	thread,
};
use tracing::{debug, error};

use super::{
	state::{try_fire, GraphHandle, Task},
	worker::WorkerContext,
};
use crate::{
	api::{Drainer, InputToken, Streamer},
	errors::StartError,
	graph::Graph,
	queue::ConcurrentQueue,
};

/// Soft capacity of the driver→worker queue.
/// Bounds how far the driver can run ahead of the workers.
const GLOBAL_QUEUE_CAPACITY: usize = 100;

/// State shared between the driver and every worker
pub(super) struct Shared<D: Drainer> {
	pub global: ConcurrentQueue<Task>,
	pub end_of_stream: AtomicBool,

	/// Terminal firings not yet drained, across all live instances
	pub outstanding: AtomicI64,

	pub fault: AtomicBool,
	pub error: Mutex<Option<StartError>>,
	pub drainer: Mutex<D>,
}

impl<D: Drainer> Shared<D> {
	/// Publish a fatal error and shut the run down.
	/// The first error wins; later ones are dropped.
	pub fn record_fault(&self, error: StartError) {
		error!(
			source = "interpreter",
			summary = "Fatal error, shutting down",
			error = %error
		);
		{
			let mut slot = self.error.lock().unwrap();
			if slot.is_none() {
				*slot = Some(error);
			}
		}
		self.fault.store(true, Ordering::Release);
		// A driver blocked on a full queue must wake to see the fault
		self.global.close();
	}
}

/// A macro-dataflow interpreter.
///
/// Owns a frozen graph and a drainer. [`Interpreter::start`] clones
/// the graph once per streamer batch, fires nodes as their inputs and
/// dependencies resolve, and routes terminal outputs to the drainer,
/// spreading the work over a pool of stealing workers.
pub struct Interpreter<D: Drainer> {
	model: Graph,
	terminal_count: usize,
	thread_count: usize,
	next_instance: AtomicU64,
	shared: Shared<D>,
}

impl<D: Drainer> Interpreter<D> {
	/// Make an interpreter over the given graph.
	///
	/// The graph is frozen here: its terminal count is recorded and
	/// every instance will drain exactly that many tokens.
	/// `thread_count` is clamped to at least one worker.
	pub fn new(model: Graph, thread_count: usize, drainer: D) -> Self {
		let terminal_count = model.terminal_count();
		Self {
			model,
			terminal_count,
			thread_count: thread_count.max(1),
			next_instance: AtomicU64::new(0),
			shared: Shared {
				global: ConcurrentQueue::new(GLOBAL_QUEUE_CAPACITY),
				end_of_stream: AtomicBool::new(true),
				outstanding: AtomicI64::new(0),
				fault: AtomicBool::new(false),
				error: Mutex::new(None),
				drainer: Mutex::new(drainer),
			},
		}
	}

	/// The number of worker threads a run will use
	pub fn thread_count(&self) -> usize {
		self.thread_count
	}

	/// Get the drainer back for inspection once runs are done
	pub fn into_drainer(self) -> D {
		self.shared.drainer.into_inner().unwrap()
	}

	/// Run the graph over `streamer`'s batches.
	///
	/// Blocks until the streamer signals end-of-stream (an empty
	/// batch) and every in-flight instance has drained, then returns
	/// the streamer so the caller may inspect its final state. The
	/// first fatal error (type mismatch, missing port, body panic)
	/// aborts the run and is returned instead.
	pub fn start<S: Streamer>(&mut self, mut streamer: S) -> Result<S, StartError> {
		// A faulted run may have left the queue closed or nonempty
		self.shared.global = ConcurrentQueue::new(GLOBAL_QUEUE_CAPACITY);
		self.shared.outstanding.store(0, Ordering::Release);
		self.shared.fault.store(false, Ordering::Release);
		*self.shared.error.lock().unwrap() = None;
		self.shared.end_of_stream.store(false, Ordering::Release);

		debug!(
			source = "interpreter",
			summary = "Starting workers",
			threads = self.thread_count
		);

		// Build every deque up front so each worker can steal from
		// all of its peers.
		let mut queues = Vec::with_capacity(self.thread_count);
		let mut stealers = Vec::with_capacity(self.thread_count);
		for _ in 0..self.thread_count {
			let queue = WorkerQueue::new_fifo();
			stealers.push(queue.stealer());
			queues.push(queue);
		}

		let shared = &self.shared;
		let stealers = &stealers[..];

		thread::scope(|scope| {
			for (index, local) in queues.into_iter().enumerate() {
				let ctx = WorkerContext {
					index,
					local,
					stealers,
					shared,
				};
				thread::Builder::new()
					.name(format!("mdf-worker-{index}"))
					.spawn_scoped(scope, move || ctx.run())
					.unwrap();
			}

			self.drive(&mut streamer);
		});

		debug!(source = "interpreter", summary = "Workers joined");

		if let Some(error) = self.shared.error.lock().unwrap().take() {
			return Err(error);
		}

		Ok(streamer)
	}

	/// The driver loop: one graph instance per non-empty batch
	fn drive<S: Streamer>(&self, streamer: &mut S) {
		loop {
			if self.shared.fault.load(Ordering::Acquire) {
				break;
			}

			let batch = streamer.next();
			if batch.is_empty() {
				break;
			}

			let instance_id = self.next_instance.fetch_add(1, Ordering::Relaxed);
			let handle = Arc::new(GraphHandle::new(instance_id, self.model.clone()));

			// Account for every sink of this instance before any of
			// its nodes can fire.
			self.shared
				.outstanding
				.fetch_add(self.terminal_count as i64, Ordering::AcqRel);

			debug!(
				source = "interpreter",
				summary = "New graph instance",
				instance = instance_id,
				inputs = batch.len()
			);

			for InputToken { destination, token } in batch {
				let state = handle.state(destination.node);
				let mut guard = state.lock().unwrap();
				guard.tokens.insert(destination.param, token);
				if try_fire(&mut guard, handle.graph.node(destination.node)) {
					drop(guard);
					self.shared.global.put(Task {
						handle: handle.clone(),
						id: destination.node,
					});
				}
			}
		}

		self.shared.end_of_stream.store(true, Ordering::Release);
		debug!(
			source = "interpreter",
			summary = "End of stream, joining workers"
		);
	}
}
