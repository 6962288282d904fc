use cadence_db::ProcessError;
use cadence_worker::WorkerError;
use thiserror::Error;

use crate::ArgType;

/// Failure of one shell line. The shell itself keeps running.
#[derive(Debug, Error)]
pub enum ShellError {
	#[error("unknown command {0}")]
	UnknownCommand(String),
	#[error("{command}: missing argument {arg}")]
	MissingArg { command: &'static str, arg: &'static str },
	#[error("{command}: argument {arg}: {value:?} is not a valid {kind}")]
	BadArg {
		command: &'static str,
		arg: &'static str,
		kind: ArgType,
		value: String,
	},
	#[error("recordname {0} not added")]
	NotAdded(String),
	#[error("record {0} not found")]
	NotFound(String),
	#[error("{0}")]
	Config(String),
	#[error(transparent)]
	Worker(#[from] WorkerError),
	#[error(transparent)]
	Process(#[from] ProcessError),
}
