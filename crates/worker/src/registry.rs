use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::{WorkerClass, WorkerExit, WorkerState};

/// Snapshot for one registered worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRecord {
	pub name: String,
	pub class: WorkerClass,
	pub state: WorkerState,
	pub ticks: u64,
	pub last_exit: Option<WorkerExit>,
}

/// Live status shared between one worker and the registry.
#[derive(Debug)]
pub struct WorkerProbe {
	name: String,
	class: WorkerClass,
	state: Mutex<WorkerState>,
	ticks: AtomicU64,
	last_exit: Mutex<Option<WorkerExit>>,
}

impl WorkerProbe {
	pub(crate) fn new(name: String, class: WorkerClass) -> Self {
		Self {
			name,
			class,
			state: Mutex::new(WorkerState::Created),
			ticks: AtomicU64::new(0),
			last_exit: Mutex::new(None),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn class(&self) -> WorkerClass {
		self.class
	}

	pub fn state(&self) -> WorkerState {
		*self.state.lock()
	}

	pub fn ticks(&self) -> u64 {
		self.ticks.load(Ordering::Acquire)
	}

	pub(crate) fn set_state(&self, state: WorkerState) {
		*self.state.lock() = state;
	}

	pub(crate) fn record_tick(&self) {
		self.ticks.fetch_add(1, Ordering::AcqRel);
	}

	pub(crate) fn set_exit(&self, exit: WorkerExit) {
		*self.last_exit.lock() = Some(exit);
	}

	pub fn snapshot(&self) -> WorkerRecord {
		WorkerRecord {
			name: self.name.clone(),
			class: self.class,
			state: self.state(),
			ticks: self.ticks(),
			last_exit: self.last_exit.lock().clone(),
		}
	}
}

/// In-memory worker registry for status snapshots.
#[derive(Debug, Default, Clone)]
pub struct WorkerStatusRegistry {
	inner: Arc<RwLock<HashMap<String, Arc<WorkerProbe>>>>,
}

impl WorkerStatusRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a probe, replacing any previous worker with the same name.
	pub fn register(&self, probe: Arc<WorkerProbe>) {
		self.inner.write().insert(probe.name().to_string(), probe);
	}

	/// Removes one worker.
	pub fn remove(&self, name: &str) -> bool {
		self.inner.write().remove(name).is_some()
	}

	/// Returns snapshots sorted by name.
	pub fn snapshots(&self) -> Vec<WorkerRecord> {
		let mut records: Vec<_> = self.inner.read().values().map(|probe| probe.snapshot()).collect();
		records.sort_by(|a, b| a.name.cmp(&b.name));
		records
	}
}
