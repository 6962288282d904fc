use std::sync::Arc;
use std::time::Duration;

use cadence_db::{AccessSecurity, Record, Registry};
use cadence_engine::{ArrayGenerator, ProcessRecord, add_record, remove_record, scheduler_delay, trace_record};
use cadence_worker::{StopOutcome, WorkerStatusRegistry};

use crate::{Args, ShellError, find_registrar, tokenize};

/// A worker started by the shell and owned until shutdown.
#[derive(Debug)]
pub enum Hosted {
	Scheduler(ProcessRecord),
	Generator(ArrayGenerator),
}

impl Hosted {
	pub fn name(&self) -> &str {
		match self {
			Self::Scheduler(scheduler) => scheduler.record().name(),
			Self::Generator(generator) => generator.record().name(),
		}
	}

	fn destroy(&self) -> StopOutcome {
		match self {
			Self::Scheduler(scheduler) => scheduler.destroy(),
			Self::Generator(generator) => generator.destroy(),
		}
	}
}

/// Line interpreter over one registry.
#[derive(Debug)]
pub struct Shell {
	registry: Registry,
	status: WorkerStatusRegistry,
	hosted: Vec<Hosted>,
}

impl Shell {
	pub fn new(registry: Registry) -> Self {
		Self {
			registry,
			status: WorkerStatusRegistry::new(),
			hosted: Vec::new(),
		}
	}

	pub fn registry(&self) -> &Registry {
		&self.registry
	}

	pub fn status(&self) -> &WorkerStatusRegistry {
		&self.status
	}

	pub fn hosted(&self) -> &[Hosted] {
		&self.hosted
	}

	pub fn generator(&self, name: &str) -> Option<&ArrayGenerator> {
		self.hosted.iter().rev().find_map(|hosted| match hosted {
			Hosted::Generator(generator) if generator.record().name() == name => Some(generator),
			_ => None,
		})
	}

	pub fn scheduler(&self, name: &str) -> Option<&ProcessRecord> {
		self.hosted.iter().rev().find_map(|hosted| match hosted {
			Hosted::Scheduler(scheduler) if scheduler.record().name() == name => Some(scheduler),
			_ => None,
		})
	}

	/// Runs one line and returns its output. Blank lines and `#` comments
	/// produce no output.
	pub fn execute(&mut self, line: &str) -> Result<String, ShellError> {
		let line = line.trim();
		if line.is_empty() || line.starts_with('#') {
			return Ok(String::new());
		}
		let mut words = tokenize(line)?;
		if words.is_empty() {
			return Ok(String::new());
		}
		let name = words.remove(0);
		let def = find_registrar(&name).ok_or(ShellError::UnknownCommand(name))?;
		let args = Args::parse(def.name, def.args, &words)?;
		tracing::debug!(command = def.name, args = words.len(), "shell.execute");
		(def.call)(self, &args)
	}

	/// Runs every line, logging failures and continuing. Returns how many failed.
	pub fn run_script<'a>(&mut self, lines: impl IntoIterator<Item = &'a str>) -> usize {
		let mut failed = 0;
		for line in lines {
			match self.execute(line) {
				Ok(output) if !output.is_empty() => tracing::info!(line, %output, "shell.script_output"),
				Ok(_) => {}
				Err(error) => {
					failed += 1;
					tracing::error!(line, %error, "shell.script_failed");
				}
			}
		}
		failed
	}

	fn add(&self, record: Arc<Record>) -> Result<(), ShellError> {
		let name = record.name().to_string();
		if self.registry.add_record(record) {
			Ok(())
		} else {
			Err(ShellError::NotAdded(name))
		}
	}

	/// Creates, registers and starts a scheduler record. A negative delay
	/// means the default delay.
	pub fn add_process_record(&mut self, name: &str, delay_secs: f64, access: AccessSecurity) -> Result<(), ShellError> {
		let scheduler = ProcessRecord::create_with_access(name, scheduler_delay(delay_secs), access, &self.registry);
		self.add(Arc::clone(scheduler.record()))?;
		let scheduler = scheduler.with_status(&self.status);
		if let Err(err) = scheduler.start() {
			scheduler.destroy();
			self.registry.remove_record(name);
			return Err(err.into());
		}
		tracing::info!(record = %name, delay_secs, "shell.process_record_started");
		self.hosted.push(Hosted::Scheduler(scheduler));
		Ok(())
	}

	pub fn add_array_generator(&mut self, name: &str, size: usize, delay: Duration) -> Result<(), ShellError> {
		let generator = ArrayGenerator::create(name, size, delay);
		self.add(Arc::clone(generator.record()))?;
		let generator = generator.with_status(&self.status);
		if let Err(err) = generator.start() {
			generator.destroy();
			self.registry.remove_record(name);
			return Err(err.into());
		}
		tracing::info!(record = %name, size, delay_secs = delay.as_secs_f64(), "shell.array_generator_started");
		self.hosted.push(Hosted::Generator(generator));
		Ok(())
	}

	pub fn add_adder_record(&mut self, name: &str) -> Result<(), ShellError> {
		self.add(add_record(name, &self.registry))
	}

	pub fn add_remove_record(&mut self, name: &str) -> Result<(), ShellError> {
		self.add(remove_record(name, &self.registry))
	}

	pub fn add_trace_record(&mut self, name: &str) -> Result<(), ShellError> {
		self.add(trace_record(name, &self.registry))
	}

	/// Stops and releases every hosted worker, newest first. Blocks until each
	/// has confirmed.
	pub fn shutdown(&mut self) -> Vec<(String, StopOutcome)> {
		let mut outcomes = Vec::with_capacity(self.hosted.len());
		while let Some(hosted) = self.hosted.pop() {
			let outcome = hosted.destroy();
			tracing::info!(worker = %hosted.name(), ?outcome, "shell.worker_stopped");
			outcomes.push((hosted.name().to_string(), outcome));
		}
		outcomes
	}
}
