use cadence_db::ProcessError;
use thiserror::Error;

/// Failure publishing a generated array. Ends the generation worker.
#[derive(Debug, Error)]
pub enum GenerateError {
	#[error("record {record}: publishing generated array failed: {source}")]
	Publish {
		record: String,
		#[source]
		source: ProcessError,
	},
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MonitorError {
	#[error("unknown provider {0:?}: only \"local\" is supported")]
	UnknownProvider(String),
	#[error("record {0} not found")]
	RecordNotFound(String),
	#[error("record {0} does not hold an array")]
	NotAnArray(String),
}
