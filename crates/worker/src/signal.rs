use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tokio_util::sync::CancellationToken;

/// Cooperative stop request shared between a worker handle and its loop.
///
/// The token is the source of truth; the condvar only wakes a loop that is
/// parked in [`StopSignal::sleep`] so a stop does not wait out the delay.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
	token: CancellationToken,
	park: Arc<Park>,
}

#[derive(Debug, Default)]
struct Park {
	lock: Mutex<()>,
	wake: Condvar,
}

impl StopSignal {
	pub fn new() -> Self {
		Self::default()
	}

	/// Raises the stop request. Idempotent.
	pub fn request_stop(&self) {
		self.token.cancel();
		let _guard = self.park.lock.lock();
		self.park.wake.notify_all();
	}

	pub fn is_stop_requested(&self) -> bool {
		self.token.is_cancelled()
	}

	/// Token view for async observers.
	pub fn token(&self) -> &CancellationToken {
		&self.token
	}

	/// Sleeps for `delay` unless a stop is requested first.
	///
	/// Returns `true` if the sleep was cut short by a stop request.
	pub fn sleep(&self, delay: Duration) -> bool {
		let deadline = Instant::now() + delay;
		let mut guard = self.park.lock.lock();
		loop {
			// Checked under the park lock: request_stop notifies while holding it.
			if self.token.is_cancelled() {
				return true;
			}
			if self.park.wake.wait_until(&mut guard, deadline).timed_out() {
				return self.token.is_cancelled();
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sleep_runs_full_delay_without_stop() {
		let signal = StopSignal::new();
		let start = Instant::now();
		assert!(!signal.sleep(Duration::from_millis(20)));
		assert!(start.elapsed() >= Duration::from_millis(20));
	}

	#[test]
	fn stop_interrupts_sleep() {
		let signal = StopSignal::new();
		let sleeper = signal.clone();
		let handle = std::thread::spawn(move || {
			let start = Instant::now();
			let interrupted = sleeper.sleep(Duration::from_secs(30));
			(interrupted, start.elapsed())
		});
		std::thread::sleep(Duration::from_millis(20));
		signal.request_stop();
		let (interrupted, elapsed) = handle.join().unwrap();
		assert!(interrupted);
		assert!(elapsed < Duration::from_secs(5));
	}

	#[test]
	fn sleep_after_stop_returns_immediately() {
		let signal = StopSignal::new();
		signal.request_stop();
		signal.request_stop();
		assert!(signal.is_stop_requested());
		assert!(signal.sleep(Duration::from_secs(30)));
	}

	#[tokio::test]
	async fn token_observes_stop() {
		let signal = StopSignal::new();
		let token = signal.token().clone();
		signal.request_stop();
		tokio::time::timeout(Duration::from_secs(1), token.cancelled()).await.unwrap();
	}
}
