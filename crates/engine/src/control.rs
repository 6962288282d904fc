//! Control records: command records that act on the registry itself.

use std::sync::Arc;

use cadence_db::{Payload, ProcessContext, ProcessError, ProcessHandler, Record, Registry, WeakRegistry};

use crate::CommandOutcome;

/// Builds a record whose `process()` adds a new plain record named `target`
/// to the registry.
pub fn add_record(name: &str, registry: &Registry) -> Arc<Record> {
	Record::builder(name)
		.payload(Payload::command())
		.handler(AddRecord {
			registry: registry.downgrade(),
		})
		.build()
}

/// Builds a record whose `process()` removes `target` from the registry.
pub fn remove_record(name: &str, registry: &Registry) -> Arc<Record> {
	Record::builder(name)
		.payload(Payload::command())
		.handler(RemoveRecord {
			registry: registry.downgrade(),
		})
		.build()
}

/// Builds a record whose `process()` sets the trace level of `target` to the
/// integer in `command`.
pub fn trace_record(name: &str, registry: &Registry) -> Arc<Record> {
	Record::builder(name)
		.payload(Payload::command())
		.handler(TraceRecord {
			registry: registry.downgrade(),
		})
		.build()
}

struct AddRecord {
	registry: WeakRegistry,
}

impl AddRecord {
	fn apply(&self, target: &str) -> CommandOutcome {
		let Some(registry) = self.registry.upgrade() else {
			return CommandOutcome::NotInRegistry(target.to_string());
		};
		if registry.add_record(Record::builder(target).build()) {
			tracing::info!(record = %target, "control.record_added");
			CommandOutcome::Success
		} else {
			CommandOutcome::AlreadyPresent(target.to_string())
		}
	}
}

impl ProcessHandler for AddRecord {
	fn process(&mut self, cx: &mut ProcessContext<'_>) -> Result<(), ProcessError> {
		let fields = cx.command_mut()?;
		fields.status = self.apply(&fields.target).to_string();
		Ok(())
	}
}

struct RemoveRecord {
	registry: WeakRegistry,
}

impl ProcessHandler for RemoveRecord {
	fn process(&mut self, cx: &mut ProcessContext<'_>) -> Result<(), ProcessError> {
		let fields = cx.command_mut()?;
		let removed = self.registry.upgrade().is_some_and(|registry| registry.remove_record(&fields.target));
		let outcome = if removed {
			tracing::info!(record = %fields.target, "control.record_removed");
			CommandOutcome::Success
		} else {
			CommandOutcome::NotFound(fields.target.clone())
		};
		fields.status = outcome.to_string();
		Ok(())
	}
}

struct TraceRecord {
	registry: WeakRegistry,
}

impl TraceRecord {
	fn apply(&self, command: &str, target: &str) -> CommandOutcome {
		let Ok(level) = command.trim().parse::<u8>() else {
			return CommandOutcome::InvalidTraceLevel(command.to_string());
		};
		match self.registry.upgrade().and_then(|registry| registry.find_record(target)) {
			Some(record) => {
				record.set_trace_level(level);
				CommandOutcome::Success
			}
			None => CommandOutcome::NotFound(target.to_string()),
		}
	}
}

impl ProcessHandler for TraceRecord {
	fn process(&mut self, cx: &mut ProcessContext<'_>) -> Result<(), ProcessError> {
		let fields = cx.command_mut()?;
		fields.status = self.apply(&fields.command, &fields.target).to_string();
		Ok(())
	}
}
