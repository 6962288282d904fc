use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// One-shot completion signal.
///
/// The first [`Latch::complete`] wins; every waiter observes that value.
#[derive(Debug)]
pub struct Latch<T> {
	value: Mutex<Option<T>>,
	done: Condvar,
}

impl<T> Default for Latch<T> {
	fn default() -> Self {
		Self {
			value: Mutex::new(None),
			done: Condvar::new(),
		}
	}
}

impl<T: Clone> Latch<T> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Stores `value` if the latch is still open. Returns `false` if it was
	/// already completed.
	pub fn complete(&self, value: T) -> bool {
		let mut slot = self.value.lock();
		if slot.is_some() {
			return false;
		}
		*slot = Some(value);
		self.done.notify_all();
		true
	}

	pub fn is_complete(&self) -> bool {
		self.value.lock().is_some()
	}

	pub fn get(&self) -> Option<T> {
		self.value.lock().clone()
	}

	/// Blocks until completed. There is no upper bound on the wait.
	pub fn wait(&self) -> T {
		let mut slot = self.value.lock();
		loop {
			if let Some(value) = slot.as_ref() {
				return value.clone();
			}
			self.done.wait(&mut slot);
		}
	}

	/// Blocks for at most `timeout`.
	pub fn wait_timeout(&self, timeout: Duration) -> Option<T> {
		let deadline = std::time::Instant::now() + timeout;
		let mut slot = self.value.lock();
		loop {
			if let Some(value) = slot.as_ref() {
				return Some(value.clone());
			}
			if self.done.wait_until(&mut slot, deadline).timed_out() {
				return slot.clone();
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use super::*;

	#[test]
	fn first_completion_wins() {
		let latch = Latch::new();
		assert!(latch.complete(1));
		assert!(!latch.complete(2));
		assert_eq!(latch.wait(), 1);
		assert_eq!(latch.get(), Some(1));
	}

	#[test]
	fn waiters_wake_on_completion() {
		let latch = Arc::new(Latch::new());
		let waiters: Vec<_> = (0..4)
			.map(|_| {
				let latch = Arc::clone(&latch);
				std::thread::spawn(move || latch.wait())
			})
			.collect();
		std::thread::sleep(Duration::from_millis(10));
		latch.complete("done");
		for waiter in waiters {
			assert_eq!(waiter.join().unwrap(), "done");
		}
	}

	#[test]
	fn wait_timeout_expires_when_open() {
		let latch: Latch<u8> = Latch::new();
		assert_eq!(latch.wait_timeout(Duration::from_millis(10)), None);
		assert!(!latch.is_complete());
	}
}
