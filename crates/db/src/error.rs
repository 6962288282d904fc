use thiserror::Error;

use crate::PayloadKind;

/// Failure raised while processing or mutating a record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProcessError {
	/// A handler reported a failure.
	#[error("{0}")]
	Failed(String),

	/// The payload does not have the shape the handler works on.
	#[error("record {record}: expected {expected} payload, found {found}")]
	InvalidPayload {
		record: String,
		expected: PayloadKind,
		found: PayloadKind,
	},

	/// A mutation was attempted without an open transaction.
	#[error("record {record}: payload mutated outside a transaction")]
	NoTransaction { record: String },
}

impl ProcessError {
	pub fn failed(msg: impl Into<String>) -> Self {
		Self::Failed(msg.into())
	}
}
