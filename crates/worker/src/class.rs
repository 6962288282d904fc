/// Execution classes used to tag worker threads and tasks in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerClass {
	/// Periodic re-processing of a record set.
	Scheduler,
	/// High-rate data generation into one record.
	Generator,
	/// Async observers of committed record updates.
	Monitor,
	/// CPU-bound checks run off the async workers.
	CpuBlocking,
}

impl WorkerClass {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Scheduler => "scheduler",
			Self::Generator => "generator",
			Self::Monitor => "monitor",
			Self::CpuBlocking => "cpu_blocking",
		}
	}
}

impl std::fmt::Display for WorkerClass {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}
