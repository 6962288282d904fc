//! Registrar table: the commands a shell line can name.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use cadence_db::AccessSecurity;
use cadence_engine::{generator_delay, run_command};

use crate::{ArgDef, Args, Shell, ShellError};

/// Handler of one registrar.
pub type RegistrarFn = fn(&mut Shell, &Args) -> Result<String, ShellError>;

/// A named shell command with typed arguments.
pub struct RegistrarDef {
	pub name: &'static str,
	pub args: &'static [ArgDef],
	pub description: &'static str,
	pub call: RegistrarFn,
}

impl RegistrarDef {
	/// `name arg1 arg2 ...`
	pub fn usage(&self) -> String {
		let mut usage = self.name.to_string();
		for arg in self.args {
			usage.push(' ');
			usage.push_str(arg.name);
		}
		usage
	}
}

impl std::fmt::Debug for RegistrarDef {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RegistrarDef").field("name", &self.name).field("args", &self.args).finish_non_exhaustive()
	}
}

pub static REGISTRARS: &[RegistrarDef] = &[
	RegistrarDef {
		name: "processRecord",
		args: &[ArgDef::string("recordName"), ArgDef::double("delay"), ArgDef::int("asLevel"), ArgDef::string("asGroup")],
		description: "create a scheduler record that processes its work set every delay seconds",
		call: process_record,
	},
	RegistrarDef {
		name: "arrayGenerator",
		args: &[ArgDef::string("recordName"), ArgDef::int("size"), ArgDef::double("delay")],
		description: "create an array record rewritten by a generation worker",
		call: array_generator,
	},
	RegistrarDef {
		name: "addRecord",
		args: &[ArgDef::string("recordName")],
		description: "create a control record that adds a plain record named by its target",
		call: add_record,
	},
	RegistrarDef {
		name: "removeRecord",
		args: &[ArgDef::string("recordName")],
		description: "create a control record that removes its target from the database",
		call: remove_record,
	},
	RegistrarDef {
		name: "traceRecord",
		args: &[ArgDef::string("recordName")],
		description: "create a control record that sets the trace level of its target",
		call: trace_record,
	},
	RegistrarDef {
		name: "help",
		args: &[ArgDef::string("command")],
		description: "list commands, or show one",
		call: help,
	},
	RegistrarDef {
		name: "dbl",
		args: &[],
		description: "list record names",
		call: dbl,
	},
	RegistrarDef {
		name: "dbcmd",
		args: &[ArgDef::string("recordName"), ArgDef::string("command"), ArgDef::string("target")],
		description: "write command and target into a command record, process it and print its status",
		call: dbcmd,
	},
	RegistrarDef {
		name: "dbpr",
		args: &[ArgDef::string("recordName")],
		description: "print a record",
		call: dbpr,
	},
	RegistrarDef {
		name: "workers",
		args: &[],
		description: "list worker threads and their state",
		call: workers,
	},
];

static INDEX: LazyLock<HashMap<&'static str, &'static RegistrarDef>> = LazyLock::new(|| REGISTRARS.iter().map(|def| (def.name, def)).collect());

pub fn find_registrar(name: &str) -> Option<&'static RegistrarDef> {
	INDEX.get(name).copied()
}

fn process_record(shell: &mut Shell, args: &Args) -> Result<String, ShellError> {
	let name = args.required_string(0)?;
	let access = AccessSecurity {
		level: args.int(2).map_or(Ok(0), i32::try_from).map_err(|_| ShellError::Config(format!("{name}: asLevel out of range")))?,
		group: args.string(3).filter(|group| !group.is_empty()).unwrap_or("DEFAULT").to_string(),
	};
	shell.add_process_record(name, args.double(1).unwrap_or(-1.0), access)?;
	Ok(String::new())
}

fn array_generator(shell: &mut Shell, args: &Args) -> Result<String, ShellError> {
	let name = args.required_string(0)?;
	let size = args.required_int(1)?;
	let size = usize::try_from(size).map_err(|_| ShellError::Config(format!("{name}: size must not be negative")))?;
	let delay = args.double(2).map_or(Duration::ZERO, generator_delay);
	shell.add_array_generator(name, size, delay)?;
	Ok(String::new())
}

fn add_record(shell: &mut Shell, args: &Args) -> Result<String, ShellError> {
	shell.add_adder_record(args.required_string(0)?)?;
	Ok(String::new())
}

fn remove_record(shell: &mut Shell, args: &Args) -> Result<String, ShellError> {
	shell.add_remove_record(args.required_string(0)?)?;
	Ok(String::new())
}

fn trace_record(shell: &mut Shell, args: &Args) -> Result<String, ShellError> {
	shell.add_trace_record(args.required_string(0)?)?;
	Ok(String::new())
}

fn help(_shell: &mut Shell, args: &Args) -> Result<String, ShellError> {
	if let Some(name) = args.string(0) {
		let def = find_registrar(name).ok_or_else(|| ShellError::UnknownCommand(name.to_string()))?;
		return Ok(format!("{}\n  {}", def.usage(), def.description));
	}
	let mut lines: Vec<String> = REGISTRARS.iter().map(RegistrarDef::usage).collect();
	lines.push("exit".to_string());
	Ok(lines.join("\n"))
}

fn dbl(shell: &mut Shell, _args: &Args) -> Result<String, ShellError> {
	Ok(shell.registry().names().join("\n"))
}

fn dbcmd(shell: &mut Shell, args: &Args) -> Result<String, ShellError> {
	let name = args.required_string(0)?;
	let command = args.required_string(1)?;
	let record = shell.registry().find_record(name).ok_or_else(|| ShellError::NotFound(name.to_string()))?;
	Ok(run_command(&record, command, args.string(2).unwrap_or_default())?)
}

fn dbpr(shell: &mut Shell, args: &Args) -> Result<String, ShellError> {
	let name = args.required_string(0)?;
	let record = shell.registry().find_record(name).ok_or_else(|| ShellError::NotFound(name.to_string()))?;
	let snapshot = record.snapshot();
	let time = snapshot.timestamp.map_or_else(|| "never".to_string(), |ts| ts.to_rfc3339());
	let access = record.access();
	Ok(format!(
		"{name}: {} sequence={} time={time} asLevel={} asGroup={} trace={}",
		snapshot.payload.summary(),
		snapshot.sequence,
		access.level,
		access.group,
		record.trace_level()
	))
}

fn workers(shell: &mut Shell, _args: &Args) -> Result<String, ShellError> {
	let lines: Vec<String> = shell
		.status()
		.snapshots()
		.into_iter()
		.map(|worker| {
			let mut line = format!("{} {} {} ticks={}", worker.name, worker.class, worker.state, worker.ticks);
			if let Some(exit) = worker.last_exit {
				line.push_str(&format!(" exit={exit}"));
			}
			line
		})
		.collect();
	Ok(lines.join("\n"))
}
