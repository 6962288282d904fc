use thiserror::Error;

use crate::WorkerState;

/// Errors from worker lifecycle operations.
#[derive(Debug, Error)]
pub enum WorkerError {
	/// `start()` was called outside the `Created` state.
	#[error("worker {worker} cannot start from state {state}")]
	InvalidState { worker: String, state: WorkerState },

	/// The OS refused to create the worker thread.
	#[error("failed to spawn thread for worker {worker}: {source}")]
	Spawn {
		worker: String,
		#[source]
		source: std::io::Error,
	},
}
