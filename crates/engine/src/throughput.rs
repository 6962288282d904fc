//! Once-per-interval rate reporting for array producers and consumers.

use std::time::{Duration, Instant};

/// Rate over the interval since the previous report.
#[derive(Debug, Clone, PartialEq)]
pub struct ThroughputReport {
	/// Counter value at the time of the report.
	pub value: i64,
	pub elapsed: Duration,
	pub iterations: u64,
	pub iterations_per_sec: f64,
	pub elements_per_sec_millions: f64,
}

impl std::fmt::Display for ThroughputReport {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(
			f,
			"value {} time {:.3} iterations/sec {:.1} elements/sec {:.3} million",
			self.value,
			self.elapsed.as_secs_f64(),
			self.iterations_per_sec,
			self.elements_per_sec_millions
		)
	}
}

/// Counts iterations and emits a [`ThroughputReport`] once per interval.
#[derive(Debug, Clone)]
pub struct ThroughputMeter {
	elements: usize,
	interval: Duration,
	since_last: u64,
	last: Instant,
}

impl ThroughputMeter {
	pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

	pub fn new(elements: usize, now: Instant) -> Self {
		Self::with_interval(elements, Self::DEFAULT_INTERVAL, now)
	}

	pub fn with_interval(elements: usize, interval: Duration, now: Instant) -> Self {
		Self {
			elements,
			interval,
			since_last: 0,
			last: now,
		}
	}

	pub fn set_elements(&mut self, elements: usize) {
		self.elements = elements;
	}

	/// Records one iteration. The report, if any, covers the iterations counted
	/// before this one; the counters then restart from this iteration.
	pub fn tick(&mut self, now: Instant, value: i64) -> Option<ThroughputReport> {
		let elapsed = now.saturating_duration_since(self.last);
		let report = (elapsed >= self.interval && !elapsed.is_zero()).then(|| {
			let secs = elapsed.as_secs_f64();
			let iterations_per_sec = self.since_last as f64 / secs;
			let report = ThroughputReport {
				value,
				elapsed,
				iterations: self.since_last,
				iterations_per_sec,
				elements_per_sec_millions: iterations_per_sec * self.elements as f64 / 1e6,
			};
			self.since_last = 0;
			self.last = now;
			report
		});
		self.since_last += 1;
		report
	}
}
