use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::Record;

type RecordMap = IndexMap<String, Arc<Record>>;

/// Shared name → record mapping.
///
/// Cloning yields another handle to the same registry. Records hold only
/// [`WeakRegistry`] handles so a registry can be dropped while it still
/// contains control records that refer back to it.
#[derive(Debug, Default, Clone)]
pub struct Registry {
	inner: Arc<RwLock<RecordMap>>,
}

impl Registry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a record under its own name. Returns `false` if the name is taken.
	pub fn add_record(&self, record: Arc<Record>) -> bool {
		let mut records = self.inner.write();
		if records.contains_key(record.name()) {
			tracing::debug!(record = %record.name(), "registry.add_duplicate");
			return false;
		}
		tracing::debug!(record = %record.name(), "registry.add");
		records.insert(record.name().to_string(), record);
		true
	}

	pub fn find_record(&self, name: &str) -> Option<Arc<Record>> {
		self.inner.read().get(name).cloned()
	}

	/// Removes a record. Returns `false` if no record has that name.
	pub fn remove_record(&self, name: &str) -> bool {
		let removed = self.inner.write().shift_remove(name).is_some();
		if removed {
			tracing::debug!(record = %name, "registry.remove");
		}
		removed
	}

	pub fn contains(&self, name: &str) -> bool {
		self.inner.read().contains_key(name)
	}

	/// Record names in insertion order.
	pub fn names(&self) -> Vec<String> {
		self.inner.read().keys().cloned().collect()
	}

	pub fn len(&self) -> usize {
		self.inner.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.read().is_empty()
	}

	pub fn downgrade(&self) -> WeakRegistry {
		WeakRegistry {
			inner: Arc::downgrade(&self.inner),
		}
	}
}

/// Non-owning registry handle.
#[derive(Debug, Clone, Default)]
pub struct WeakRegistry {
	inner: Weak<RwLock<RecordMap>>,
}

impl WeakRegistry {
	pub fn upgrade(&self) -> Option<Registry> {
		self.inner.upgrade().map(|inner| Registry { inner })
	}
}
