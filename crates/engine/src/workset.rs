//! Ordered set of records driven by one scheduler worker.

use std::sync::Arc;

use cadence_db::{Record, Registry};
use indexmap::IndexMap;
use parking_lot::{Mutex, MutexGuard};

use crate::CommandOutcome;

pub(crate) type Entries = IndexMap<String, Arc<Record>>;

/// Records a scheduler processes each tick, in insertion order.
///
/// One mutex guards the whole set. The scheduler holds it for an entire tick,
/// so `add`/`remove` land either before or after a tick, never inside one.
#[derive(Debug, Default)]
pub struct WorkSet {
	entries: Mutex<Entries>,
}

impl WorkSet {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds the registry's record called `name`.
	pub fn add(&self, name: &str, registry: &Registry) -> CommandOutcome {
		let mut entries = self.entries.lock();
		if entries.contains_key(name) {
			return CommandOutcome::AlreadyPresent(name.to_string());
		}
		let Some(record) = registry.find_record(name) else {
			return CommandOutcome::NotInRegistry(name.to_string());
		};
		entries.insert(name.to_string(), record);
		CommandOutcome::Success
	}

	pub fn remove(&self, name: &str) -> CommandOutcome {
		match self.entries.lock().shift_remove(name) {
			Some(_) => CommandOutcome::Success,
			None => CommandOutcome::NotFound(name.to_string()),
		}
	}

	pub fn contains(&self, name: &str) -> bool {
		self.entries.lock().contains_key(name)
	}

	pub fn names(&self) -> Vec<String> {
		self.entries.lock().keys().cloned().collect()
	}

	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}

	/// Visits every entry in insertion order with the set-mutex held.
	pub fn for_each_locked(&self, mut f: impl FnMut(&str, &Arc<Record>)) {
		for (name, record) in self.entries.lock().iter() {
			f(name, record);
		}
	}

	pub(crate) fn lock(&self) -> MutexGuard<'_, Entries> {
		self.entries.lock()
	}
}

#[cfg(test)]
mod tests;
