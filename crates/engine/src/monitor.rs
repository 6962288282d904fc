//! Array monitors: consume committed snapshots of a generated record and
//! check that every array arrives whole and in order.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use cadence_db::{ListenerId, Record, RecordListener, RecordSnapshot, Registry};
use cadence_worker::WorkerClass;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{MonitorError, ThroughputMeter};

/// The only provider: records in the same process's registry.
pub const LOCAL_PROVIDER: &str = "local";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorOptions {
	/// Deliver every commit through a bounded queue instead of latest-only.
	pub use_queue: bool,
	pub queue_size: usize,
	pub report_interval: Duration,
}

impl Default for MonitorOptions {
	fn default() -> Self {
		Self {
			use_queue: false,
			queue_size: 16,
			report_interval: ThroughputMeter::DEFAULT_INTERVAL,
		}
	}
}

/// Counters kept by a running monitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorCounts {
	pub received: u64,
	/// Arrays whose elements were not all equal.
	pub inconsistent: u64,
	/// Arrays whose value was below the previous one.
	pub regressions: u64,
	/// Commits dropped because the queue was full.
	pub overruns: u64,
}

#[derive(Debug, Default)]
struct MonitorStats {
	received: AtomicU64,
	inconsistent: AtomicU64,
	regressions: AtomicU64,
	overruns: AtomicU64,
}

impl MonitorStats {
	fn counts(&self) -> MonitorCounts {
		MonitorCounts {
			received: self.received.load(Ordering::Relaxed),
			inconsistent: self.inconsistent.load(Ordering::Relaxed),
			regressions: self.regressions.load(Ordering::Relaxed),
			overruns: self.overruns.load(Ordering::Relaxed),
		}
	}
}

enum Feed {
	Queue(mpsc::Sender<RecordSnapshot>),
	Latest(watch::Sender<Option<RecordSnapshot>>),
}

/// Listener side; runs under the record lock so it never blocks.
struct FeedListener {
	feed: Feed,
	stats: Arc<MonitorStats>,
}

impl RecordListener for FeedListener {
	fn committed(&self, snapshot: &RecordSnapshot) {
		match &self.feed {
			Feed::Queue(tx) => {
				if tx.try_send(snapshot.clone()).is_err() {
					self.stats.overruns.fetch_add(1, Ordering::Relaxed);
				}
			}
			Feed::Latest(tx) => {
				tx.send_replace(Some(snapshot.clone()));
			}
		}
	}
}

enum Source {
	Queue(mpsc::Receiver<RecordSnapshot>),
	Latest(watch::Receiver<Option<RecordSnapshot>>),
}

impl Source {
	async fn next(&mut self) -> Option<RecordSnapshot> {
		match self {
			Self::Queue(rx) => rx.recv().await,
			Self::Latest(rx) => loop {
				rx.changed().await.ok()?;
				let latest = rx.borrow_and_update().clone();
				if latest.is_some() {
					return latest;
				}
			},
		}
	}
}

/// A running monitor on one record.
pub struct ArrayMonitor {
	record: Arc<Record>,
	listener: ListenerId,
	cancel: CancellationToken,
	task: Option<JoinHandle<()>>,
	stats: Arc<MonitorStats>,
}

impl std::fmt::Debug for ArrayMonitor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ArrayMonitor").field("record", &self.record.name()).field("counts", &self.counts()).finish()
	}
}

impl ArrayMonitor {
	/// Attaches to `record_name` through `provider` and spawns the consumer task.
	pub fn start(registry: &Registry, provider: &str, record_name: &str, options: MonitorOptions) -> Result<Self, MonitorError> {
		if provider != LOCAL_PROVIDER {
			return Err(MonitorError::UnknownProvider(provider.to_string()));
		}
		let record = registry.find_record(record_name).ok_or_else(|| MonitorError::RecordNotFound(record_name.to_string()))?;
		if record.lock().payload().as_array().is_none() {
			return Err(MonitorError::NotAnArray(record_name.to_string()));
		}

		let stats = Arc::new(MonitorStats::default());
		let (feed, source) = if options.use_queue {
			let (tx, rx) = mpsc::channel(options.queue_size.max(1));
			(Feed::Queue(tx), Source::Queue(rx))
		} else {
			let (tx, rx) = watch::channel(None);
			(Feed::Latest(tx), Source::Latest(rx))
		};
		let listener = record.add_listener(Arc::new(FeedListener {
			feed,
			stats: Arc::clone(&stats),
		}));

		let cancel = CancellationToken::new();
		let task = cadence_worker::spawn(
			WorkerClass::Monitor,
			run_monitor(record_name.to_string(), source, cancel.clone(), Arc::clone(&stats), options.report_interval),
		);
		tracing::info!(record = %record_name, use_queue = options.use_queue, "monitor.start");

		Ok(Self {
			record,
			listener,
			cancel,
			task: Some(task),
			stats,
		})
	}

	pub fn record_name(&self) -> &str {
		self.record.name()
	}

	pub fn counts(&self) -> MonitorCounts {
		self.stats.counts()
	}

	/// Detaches from the record and waits for the consumer task to finish.
	pub async fn stop(mut self) -> MonitorCounts {
		self.detach();
		if let Some(task) = self.task.take() {
			if let Err(err) = task.await {
				tracing::warn!(record = %self.record.name(), error = %err, "monitor.task_failed");
			}
		}
		let counts = self.counts();
		tracing::info!(record = %self.record.name(), received = counts.received, inconsistent = counts.inconsistent, "monitor.stop");
		counts
	}

	fn detach(&self) {
		self.cancel.cancel();
		self.record.remove_listener(self.listener);
	}
}

impl Drop for ArrayMonitor {
	fn drop(&mut self) {
		self.detach();
	}
}

/// Arrays up to this length are checked inline on the monitor task.
const INLINE_SCAN_LIMIT: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayCheck {
	Empty,
	Uniform(i64),
	Mixed,
}

fn check_array(values: &[i64]) -> ArrayCheck {
	match values.first() {
		None => ArrayCheck::Empty,
		Some(first) if values.iter().all(|v| v == first) => ArrayCheck::Uniform(*first),
		Some(_) => ArrayCheck::Mixed,
	}
}

/// Scans large arrays on the blocking pool so the async workers stay free.
async fn scan(values: Arc<[i64]>) -> Result<ArrayCheck, tokio::task::JoinError> {
	if values.len() <= INLINE_SCAN_LIMIT {
		return Ok(check_array(&values));
	}
	cadence_worker::spawn_blocking(WorkerClass::CpuBlocking, move || check_array(&values)).await
}

async fn run_monitor(name: String, mut source: Source, cancel: CancellationToken, stats: Arc<MonitorStats>, interval: Duration) {
	let mut meter: Option<ThroughputMeter> = None;
	let mut last_value: Option<i64> = None;

	loop {
		let snapshot = tokio::select! {
			biased;
			_ = cancel.cancelled() => break,
			next = source.next() => match next {
				Some(snapshot) => snapshot,
				None => break,
			},
		};
		stats.received.fetch_add(1, Ordering::Relaxed);

		let Some(values) = snapshot.payload.as_array().cloned() else {
			stats.inconsistent.fetch_add(1, Ordering::Relaxed);
			tracing::warn!(record = %name, kind = %snapshot.payload.kind(), "monitor.not_an_array");
			continue;
		};
		let len = values.len();
		let check = match scan(values).await {
			Ok(check) => check,
			Err(err) => {
				tracing::warn!(record = %name, error = %err, "monitor.scan_failed");
				continue;
			}
		};
		let value = match check {
			ArrayCheck::Empty => continue,
			ArrayCheck::Mixed => {
				stats.inconsistent.fetch_add(1, Ordering::Relaxed);
				tracing::warn!(record = %name, sequence = snapshot.sequence, "monitor.mixed_array");
				continue;
			}
			ArrayCheck::Uniform(value) => value,
		};
		if last_value.is_some_and(|last| value < last) {
			stats.regressions.fetch_add(1, Ordering::Relaxed);
			tracing::warn!(record = %name, value, last = ?last_value, "monitor.value_regressed");
		}
		last_value = Some(value);

		let now = Instant::now();
		let active = meter.get_or_insert_with(|| ThroughputMeter::with_interval(len, interval, now));
		active.set_elements(len);
		if let Some(report) = active.tick(now, value) {
			tracing::info!(
				record = %name,
				value = report.value,
				iterations_per_sec = report.iterations_per_sec,
				elements_per_sec_millions = report.elements_per_sec_millions,
				"monitor.throughput"
			);
		}
	}
	tracing::debug!(record = %name, "monitor.exit");
}
