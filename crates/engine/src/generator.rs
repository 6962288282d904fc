//! Generation worker: fills a record with a fresh uniform array every tick
//! and reports throughput.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use cadence_db::{Payload, Record, StampTime};
use cadence_worker::{StopOutcome, TickContext, TickFlow, Worker, WorkerClass, WorkerError, WorkerLoop, WorkerStatusRegistry};
use chrono::Utc;
use tokio::sync::watch;

use crate::{GenerateError, ThroughputMeter, ThroughputReport};

/// Converts a delay in seconds; negative values mean no delay.
pub fn generator_delay(seconds: f64) -> Duration {
	if seconds > 0.0 && seconds.is_finite() {
		Duration::from_secs_f64(seconds)
	} else {
		Duration::ZERO
	}
}

/// An array record and the worker that keeps rewriting it.
pub struct ArrayGenerator {
	record: Arc<Record>,
	worker: Worker,
	generated: Arc<AtomicU64>,
	reports: watch::Receiver<Option<ThroughputReport>>,
}

impl std::fmt::Debug for ArrayGenerator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ArrayGenerator")
			.field("record", &self.record.name())
			.field("state", &self.worker.state())
			.field("generated", &self.generated())
			.finish()
	}
}

impl ArrayGenerator {
	/// Builds an array record of `size` zeros with the timestamping handler.
	pub fn create(name: &str, size: usize, delay: Duration) -> Self {
		let record = Record::builder(name).payload(Payload::filled(size, 0)).handler(StampTime).build();
		Self::for_record(record, size, delay)
	}

	/// Drives an existing record; its handler runs after every replacement.
	pub fn for_record(record: Arc<Record>, size: usize, delay: Duration) -> Self {
		let generated = Arc::new(AtomicU64::new(0));
		let (tx, reports) = watch::channel(None);
		let worker = Worker::new(
			record.name(),
			WorkerClass::Generator,
			GeneratorLoop {
				record: Arc::clone(&record),
				size,
				delay,
				value: 0,
				meter: ThroughputMeter::new(size, Instant::now()),
				reports: tx,
				generated: Arc::clone(&generated),
			},
		);
		Self {
			record,
			worker,
			generated,
			reports,
		}
	}

	#[must_use]
	pub fn with_status(mut self, status: &WorkerStatusRegistry) -> Self {
		self.worker = self.worker.with_status(status);
		self
	}

	pub fn record(&self) -> &Arc<Record> {
		&self.record
	}

	pub fn worker(&self) -> &Worker {
		&self.worker
	}

	/// Number of arrays published so far.
	pub fn generated(&self) -> u64 {
		self.generated.load(Ordering::Relaxed)
	}

	pub fn latest_report(&self) -> Option<ThroughputReport> {
		self.reports.borrow().clone()
	}

	pub fn subscribe_reports(&self) -> watch::Receiver<Option<ThroughputReport>> {
		self.reports.clone()
	}

	pub fn start(&self) -> Result<(), WorkerError> {
		self.worker.start()
	}

	pub fn stop(&self) -> StopOutcome {
		self.worker.stop()
	}

	pub fn destroy(&self) -> StopOutcome {
		self.worker.destroy()
	}
}

struct GeneratorLoop {
	record: Arc<Record>,
	size: usize,
	delay: Duration,
	value: i64,
	meter: ThroughputMeter,
	reports: watch::Sender<Option<ThroughputReport>>,
	generated: Arc<AtomicU64>,
}

impl GeneratorLoop {
	fn publish(&self, values: Arc<[i64]>) -> Result<(), GenerateError> {
		let publish_err = |source| GenerateError::Publish {
			record: self.record.name().to_string(),
			source,
		};
		let mut guard = self.record.lock();
		guard.begin_transaction();
		guard.replace_array(values).map_err(publish_err)?;
		guard.set_timestamp(Utc::now()).map_err(publish_err)?;
		guard.process().map_err(publish_err)?;
		guard.end_transaction();
		Ok(())
	}
}

impl WorkerLoop for GeneratorLoop {
	fn delay(&self) -> Duration {
		self.delay
	}

	fn tick(&mut self, ctx: &TickContext<'_>) -> Result<TickFlow, String> {
		if let Some(report) = self.meter.tick(Instant::now(), self.value) {
			tracing::info!(
				worker = %ctx.worker_name(),
				value = report.value,
				elapsed_secs = report.elapsed.as_secs_f64(),
				iterations_per_sec = report.iterations_per_sec,
				elements_per_sec_millions = report.elements_per_sec_millions,
				"generator.throughput"
			);
			self.reports.send_replace(Some(report));
		}

		let values: Arc<[i64]> = std::iter::repeat_n(self.value, self.size).collect();
		self.value = self.value.wrapping_add(1);
		self.publish(values).map_err(|err| err.to_string())?;
		self.generated.fetch_add(1, Ordering::Relaxed);
		Ok(TickFlow::Continue)
	}
}

#[cfg(test)]
mod tests;
