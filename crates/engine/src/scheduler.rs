//! Scheduler worker: a command record that owns a [`WorkSet`] and a thread
//! processing every record in it once per tick.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use cadence_db::{AccessSecurity, Payload, ProcessContext, ProcessError, ProcessHandler, Record, Registry, WeakRegistry};
use cadence_worker::{StopOutcome, TickContext, TickFlow, Worker, WorkerClass, WorkerError, WorkerLoop, WorkerStatusRegistry, panic_message};

use crate::{CommandKind, CommandOutcome, WorkSet};

/// Delay used when a registrar is given a negative one.
pub const DEFAULT_SCHEDULER_DELAY: Duration = Duration::from_secs(1);

/// Converts a registrar delay in seconds; negative (or non-finite) values fall
/// back to [`DEFAULT_SCHEDULER_DELAY`].
pub fn scheduler_delay(seconds: f64) -> Duration {
	if seconds < 0.0 || !seconds.is_finite() {
		DEFAULT_SCHEDULER_DELAY
	} else {
		Duration::from_secs_f64(seconds)
	}
}

/// Counters for one scheduler.
#[derive(Debug, Default)]
pub struct SchedulerStats {
	ticks: AtomicU64,
	processed: AtomicU64,
	failures: AtomicU64,
}

/// Point-in-time copy of [`SchedulerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerCounts {
	pub ticks: u64,
	pub processed: u64,
	pub failures: u64,
}

impl SchedulerStats {
	pub fn counts(&self) -> SchedulerCounts {
		SchedulerCounts {
			ticks: self.ticks.load(Ordering::Relaxed),
			processed: self.processed.load(Ordering::Relaxed),
			failures: self.failures.load(Ordering::Relaxed),
		}
	}
}

/// A scheduler record plus the worker that drives its set.
pub struct ProcessRecord {
	record: Arc<Record>,
	work_set: Arc<WorkSet>,
	stats: Arc<SchedulerStats>,
	worker: Worker,
}

impl std::fmt::Debug for ProcessRecord {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ProcessRecord")
			.field("record", &self.record.name())
			.field("state", &self.worker.state())
			.field("work_set", &self.work_set.len())
			.finish()
	}
}

impl ProcessRecord {
	/// Builds the record and its (not yet started) worker. The record is not
	/// added to `registry`; only its handler keeps a weak handle to it.
	pub fn create(name: &str, delay: Duration, registry: &Registry) -> Self {
		Self::create_with_access(name, delay, AccessSecurity::default(), registry)
	}

	pub fn create_with_access(name: &str, delay: Duration, access: AccessSecurity, registry: &Registry) -> Self {
		let work_set = Arc::new(WorkSet::new());
		let stats = Arc::new(SchedulerStats::default());
		let record = Record::builder(name)
			.payload(Payload::command())
			.access(access.level, access.group)
			.handler(WorkSetCommand {
				work_set: Arc::clone(&work_set),
				registry: registry.downgrade(),
			})
			.build();
		let worker = Worker::new(
			name,
			WorkerClass::Scheduler,
			SchedulerLoop {
				work_set: Arc::clone(&work_set),
				stats: Arc::clone(&stats),
				delay,
			},
		);
		Self {
			record,
			work_set,
			stats,
			worker,
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

	pub fn work_set(&self) -> &Arc<WorkSet> {
		&self.work_set
	}

	pub fn worker(&self) -> &Worker {
		&self.worker
	}

	pub fn counts(&self) -> SchedulerCounts {
		self.stats.counts()
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

/// Handler of the scheduler record: applies add/remove to the work set.
struct WorkSetCommand {
	work_set: Arc<WorkSet>,
	registry: WeakRegistry,
}

impl WorkSetCommand {
	fn apply(&self, own: &str, command: &str, target: &str) -> CommandOutcome {
		match CommandKind::decode(command) {
			Err(invalid) => invalid,
			// Adding itself would re-lock the set mid-tick.
			Ok(CommandKind::Add) if target == own => CommandOutcome::SelfReference(target.to_string()),
			Ok(CommandKind::Add) => match self.registry.upgrade() {
				Some(registry) => self.work_set.add(target, &registry),
				None => CommandOutcome::NotInRegistry(target.to_string()),
			},
			Ok(CommandKind::Remove) => self.work_set.remove(target),
		}
	}
}

impl ProcessHandler for WorkSetCommand {
	fn process(&mut self, cx: &mut ProcessContext<'_>) -> Result<(), ProcessError> {
		let own = cx.name().to_string();
		let fields = cx.command_mut()?;
		let outcome = self.apply(&own, &fields.command, &fields.target);
		tracing::debug!(record = %own, command = %fields.command, target = %fields.target, %outcome, "scheduler.command");
		fields.status = outcome.to_string();
		Ok(())
	}
}

struct SchedulerLoop {
	work_set: Arc<WorkSet>,
	stats: Arc<SchedulerStats>,
	delay: Duration,
}

impl WorkerLoop for SchedulerLoop {
	fn delay(&self) -> Duration {
		self.delay
	}

	fn tick(&mut self, ctx: &TickContext<'_>) -> Result<TickFlow, String> {
		let entries = self.work_set.lock();
		if ctx.stop_requested() {
			return Ok(TickFlow::Exit);
		}
		for (name, record) in entries.iter() {
			match process_isolated(record) {
				Ok(()) => {
					self.stats.processed.fetch_add(1, Ordering::Relaxed);
				}
				Err(error) => {
					self.stats.failures.fetch_add(1, Ordering::Relaxed);
					tracing::warn!(worker = %ctx.worker_name(), record = %name, %error, "scheduler.process_failed");
				}
			}
		}
		drop(entries);
		self.stats.ticks.fetch_add(1, Ordering::Relaxed);
		Ok(TickFlow::Continue)
	}
}

/// One lock/begin/process/end/unlock cycle. Errors and panics from the
/// handler are reported, never propagated, and always close the transaction.
pub(crate) fn process_isolated(record: &Record) -> Result<(), String> {
	let mut guard = record.lock();
	guard.begin_transaction();
	let result = catch_unwind(AssertUnwindSafe(|| guard.process()));
	guard.end_transaction();
	drop(guard);
	match result {
		Ok(Ok(())) => Ok(()),
		Ok(Err(err)) => Err(err.to_string()),
		Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
	}
}

#[cfg(test)]
mod tests;
