//! A bounded multi-producer multi-consumer FIFO

use std::{
	collections::VecDeque,
	sync::{Condvar, Mutex},
};

struct Inner<T> {
	deque: VecDeque<T>,
	closed: bool,
}

/// A FIFO with a soft capacity.
///
/// [`ConcurrentQueue::put`] blocks while the queue is at capacity;
/// [`ConcurrentQueue::get`] never blocks. Consumers that drain the
/// queue below a quarter of its capacity wake every blocked producer.
/// A capacity of zero means unbounded.
pub struct ConcurrentQueue<T> {
	capacity: usize,
	inner: Mutex<Inner<T>>,
	resume: Condvar,
}

impl<T> ConcurrentQueue<T> {
	/// Make a queue with the given soft capacity (0 = unbounded)
	pub fn new(capacity: usize) -> Self {
		Self {
			capacity,
			inner: Mutex::new(Inner {
				deque: VecDeque::new(),
				closed: false,
			}),
			resume: Condvar::new(),
		}
	}

	/// Is the queue empty right now?
	pub fn is_empty(&self) -> bool {
		self.inner.lock().unwrap().deque.is_empty()
	}

	/// Append an element, blocking while the queue is at capacity.
	/// Never blocks once the queue is [`ConcurrentQueue::close`]d.
	pub fn put(&self, value: T) {
		let mut inner = self.inner.lock().unwrap();
		while self.capacity > 0 && !inner.closed && inner.deque.len() >= self.capacity {
			inner = self.resume.wait(inner).unwrap();
		}
		inner.deque.push_back(value);
	}

	/// Pop the front element if there is one
	pub fn get(&self) -> Option<T> {
		let mut inner = self.inner.lock().unwrap();
		let value = inner.deque.pop_front();
		// Low-water mark: len < capacity/4
		if value.is_some() && self.capacity > 0 && inner.deque.len() * 4 < self.capacity {
			self.resume.notify_all();
		}
		value
	}

	/// Release every producer blocked in [`ConcurrentQueue::put`],
	/// now and in the future. Elements already queued stay readable.
	/// Used when a run shuts down on a fault.
	pub fn close(&self) {
		let mut inner = self.inner.lock().unwrap();
		inner.closed = true;
		self.resume.notify_all();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::{
		sync::{mpsc, Arc},
		thread,
		time::Duration,
	};

	#[test]
	fn fifo_order() {
		let queue = ConcurrentQueue::new(0);
		queue.put(1);
		queue.put(2);
		queue.put(3);
		assert_eq!(queue.get(), Some(1));
		assert_eq!(queue.get(), Some(2));
		assert_eq!(queue.get(), Some(3));
		assert_eq!(queue.get(), None);
		assert!(queue.is_empty());
	}

	#[test]
	fn put_blocks_at_capacity() {
		let queue = Arc::new(ConcurrentQueue::new(4));
		for i in 0..4 {
			queue.put(i);
		}

		let (done_send, done_recv) = mpsc::channel();
		let producer = {
			let queue = queue.clone();
			thread::spawn(move || {
				queue.put(4);
				done_send.send(()).unwrap();
			})
		};

		// The fifth put must not complete while the queue is full
		assert!(done_recv.recv_timeout(Duration::from_millis(100)).is_err());

		// Draining to the low-water mark wakes the producer
		for i in 0..4 {
			assert_eq!(queue.get(), Some(i));
		}
		done_recv.recv_timeout(Duration::from_secs(5)).unwrap();
		producer.join().unwrap();
		assert_eq!(queue.get(), Some(4));
	}

	#[test]
	fn unbounded_put_never_blocks() {
		let queue = ConcurrentQueue::new(0);
		for i in 0..10_000 {
			queue.put(i);
		}
		assert_eq!(queue.get(), Some(0));
	}

	#[test]
	fn close_releases_blocked_producers() {
		let queue = Arc::new(ConcurrentQueue::new(1));
		queue.put(0);

		let producer = {
			let queue = queue.clone();
			thread::spawn(move || queue.put(1))
		};

		thread::sleep(Duration::from_millis(50));
		queue.close();
		producer.join().unwrap();

		// Queued elements stay readable after close
		assert_eq!(queue.get(), Some(0));
		assert_eq!(queue.get(), Some(1));
	}
}
