//! The work-stealing worker loop

use crossbeam::deque::{Steal, Stealer, Worker as WorkerQueue};
use std::{
	any::Any,
	panic::{self, AssertUnwindSafe},
	sync::atomic::Ordering,
	thread,
};
use tracing::debug;

use super::{
	runner::Shared,
	state::{try_fire, Task},
};
use crate::{api::Drainer, errors::StartError};

/// Everything one worker thread needs:
/// its own deque, its peers' stealers, and the engine's shared state.
pub(super) struct WorkerContext<'a, D: Drainer> {
	pub index: usize,
	pub local: WorkerQueue<Task>,
	pub stealers: &'a [Stealer<Task>],
	pub shared: &'a Shared<D>,
}

impl<'a, D: Drainer> WorkerContext<'a, D> {
	/// The worker main loop.
	///
	/// Pops local work first, then the global queue, then steals from
	/// peers. With nothing to do it yields until the driver signals
	/// end-of-stream and no terminal firing is outstanding.
	pub fn run(self) {
		debug!(source = "worker", summary = "Worker running", index = self.index);

		loop {
			if self.shared.fault.load(Ordering::Acquire) {
				return;
			}

			match self.next_task() {
				Some(task) => {
					if let Err(error) = self.run_task(task) {
						self.shared.record_fault(error);
						return;
					}
				}
				None => {
					if self.shared.end_of_stream.load(Ordering::Acquire)
						&& self.shared.outstanding.load(Ordering::Acquire) == 0
					{
						debug!(source = "worker", summary = "Worker exiting", index = self.index);
						return;
					}
					thread::yield_now();
				}
			}
		}
	}

	fn next_task(&self) -> Option<Task> {
		self.local
			.pop()
			.or_else(|| self.shared.global.get())
			.or_else(|| self.steal())
	}

	/// Visit peers in rotational order; first success wins
	fn steal(&self) -> Option<Task> {
		let n = self.stealers.len();
		for i in 1..n {
			let victim = &self.stealers[(self.index + i) % n];
			loop {
				match victim.steal() {
					Steal::Success(task) => return Some(task),
					Steal::Retry => continue,
					Steal::Empty => break,
				}
			}
		}
		None
	}

	/// Fire one node: execute its instruction, then either hand the
	/// result to the drainer (terminal) or bump dependents and route
	/// the result along data edges, scheduling anything that became
	/// fireable onto the local deque.
	fn run_task(&self, task: Task) -> Result<(), StartError> {
		let node = task.handle.graph.node(task.id);
		let state = task.handle.state(task.id);

		debug!(
			source = "worker",
			summary = "Firing node",
			instance = task.handle.instance_id,
			node = task.id.as_usize(),
			worker = self.index
		);

		// Snapshot the inputs so the state lock is not held while the
		// body runs. Token clones share their values.
		let inputs = state.lock().unwrap().tokens.clone();

		let result =
			panic::catch_unwind(AssertUnwindSafe(|| node.instruction().execute(&inputs)));
		let result = match result {
			Ok(Ok(token)) => token,
			Ok(Err(error)) => {
				return Err(StartError::Instruction {
					node: task.id,
					error,
				});
			}
			Err(payload) => {
				return Err(StartError::BodyPanic {
					node: task.id,
					message: panic_message(payload),
				});
			}
		};

		if node.is_terminal() {
			{
				let mut drainer = self.shared.drainer.lock().unwrap();
				drainer.accept(result);
			}
			let left = self.shared.outstanding.fetch_sub(1, Ordering::AcqRel) - 1;
			debug_assert!(left >= 0, "terminal firings outnumbered instances");
		} else {
			// Dependency bumps come first: a dependent that needs no
			// data from this node may fire before the result lands.
			for dependent in node.dependents() {
				let state = task.handle.state(*dependent);
				let mut guard = state.lock().unwrap();
				guard.resolved_dependencies += 1;
				if try_fire(&mut guard, task.handle.graph.node(*dependent)) {
					drop(guard);
					self.local.push(Task {
						handle: task.handle.clone(),
						id: *dependent,
					});
				}
			}

			for address in node.links() {
				let state = task.handle.state(address.node);
				let mut guard = state.lock().unwrap();
				guard.tokens.insert(address.param.clone(), result.clone());
				if try_fire(&mut guard, task.handle.graph.node(address.node)) {
					drop(guard);
					self.local.push(Task {
						handle: task.handle.clone(),
						id: address.node,
					});
				}
			}
		}

		Ok(())
	}
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
	if let Some(s) = payload.downcast_ref::<&str>() {
		(*s).to_string()
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s.clone()
	} else {
		String::from("opaque panic payload")
	}
}
