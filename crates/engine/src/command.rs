//! Commands accepted by command records and the status strings they produce.

use cadence_db::{ProcessError, Record, RecordGuard};
use strum_macros::{AsRefStr, EnumString};

/// Work-set command, decoded once from a record's `command` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum CommandKind {
	Add,
	Remove,
}

impl CommandKind {
	/// Parses a command string; unknown commands come back as the outcome to report.
	pub fn decode(command: &str) -> Result<Self, CommandOutcome> {
		command.parse().map_err(|_| CommandOutcome::InvalidCommand(command.to_string()))
	}
}

/// Result of a command, written verbatim into the record's `status` field.
///
/// Duplicates and misses are ordinary outcomes here, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
	Success,
	AlreadyPresent(String),
	NotInRegistry(String),
	NotFound(String),
	/// A process record asked to schedule itself.
	SelfReference(String),
	InvalidCommand(String),
	InvalidTraceLevel(String),
}

impl CommandOutcome {
	pub fn is_success(&self) -> bool {
		matches!(self, Self::Success)
	}
}

impl std::fmt::Display for CommandOutcome {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Success => f.write_str("success"),
			Self::AlreadyPresent(name) => write!(f, "{name} already present"),
			Self::NotInRegistry(name) => write!(f, "{name} not in registry"),
			Self::NotFound(name) => write!(f, "{name} not found"),
			Self::SelfReference(name) => write!(f, "{name} cannot process itself"),
			Self::InvalidCommand(command) => write!(f, "{command} not a valid command: only add and remove are valid"),
			Self::InvalidTraceLevel(command) => write!(f, "{command} is not a trace level"),
		}
	}
}

/// Writes `command`/`target` into a command record, processes it inside one
/// transaction and returns the status it left behind.
pub fn run_command(record: &Record, command: &str, target: &str) -> Result<String, ProcessError> {
	let mut guard = record.lock();
	guard.begin_transaction();
	let result = write_and_process(&mut guard, command, target);
	guard.end_transaction();
	result
}

fn write_and_process(guard: &mut RecordGuard<'_>, command: &str, target: &str) -> Result<String, ProcessError> {
	let fields = guard.command_mut()?;
	fields.command = command.to_string();
	fields.target = target.to_string();
	fields.status.clear();
	guard.process()?;
	Ok(guard.payload().as_command().map(|fields| fields.status.clone()).unwrap_or_default())
}
