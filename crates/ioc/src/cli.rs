use std::path::PathBuf;

use clap::{ArgAction, Parser};

pub const USAGE: &str = "cadence recordName size delay providerName nMonitor useQueue";

/// Command line arguments. All positionals have defaults.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "cadence")]
#[command(about = "Array performance server")]
pub struct Cli {
	/// Name of the generated array record
	#[arg(default_value = "arrayPerformance")]
	pub record_name: String,

	/// Number of elements in each generated array
	#[arg(default_value_t = 50_000_000)]
	pub size: usize,

	/// Seconds between generated arrays
	#[arg(default_value_t = 0.01, allow_negative_numbers = true)]
	pub delay: f64,

	/// Provider the monitors attach through
	#[arg(default_value = "local")]
	pub provider: String,

	/// Number of monitors; also the number of generated records (at least one)
	#[arg(default_value_t = 1)]
	pub monitors: usize,

	/// Queue every update to the monitors instead of keeping only the latest
	#[arg(default_value_t = false, action = ArgAction::Set)]
	pub use_queue: bool,

	/// TOML file with startup lines and logging settings
	#[arg(long, value_name = "PATH")]
	pub config: Option<PathBuf>,

	/// Verbose logging
	#[arg(short, long)]
	pub verbose: bool,
}

impl Cli {
	/// Parses `args`; `None` means usage was printed and nothing should run.
	pub fn parse_or_usage<I, T>(args: I) -> Option<Self>
	where
		I: IntoIterator<Item = T>,
		T: Into<std::ffi::OsString> + Clone,
	{
		let args: Vec<std::ffi::OsString> = args.into_iter().map(Into::into).collect();
		if args.iter().skip(1).any(|arg| arg == "-help") {
			println!("{}", usage());
			return None;
		}
		match Self::try_parse_from(args) {
			Ok(cli) => Some(cli),
			Err(err) => {
				if matches!(err.kind(), clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion) {
					let _ = err.print();
				} else {
					eprintln!("{err}");
					println!("{}", usage());
				}
				None
			}
		}
	}

	/// Number of generation workers to start.
	pub fn generators(&self) -> usize {
		self.monitors.max(1)
	}

	/// Record owned by generation worker `index`.
	pub fn generated_record(&self, index: usize) -> String {
		if index == 0 {
			self.record_name.clone()
		} else {
			format!("{}{index}", self.record_name)
		}
	}

	/// The effective positional arguments, in usage order.
	pub fn summary(&self) -> String {
		format!(
			"cadence {} {} {} {} {} {}",
			self.record_name, self.size, self.delay, self.provider, self.monitors, self.use_queue
		)
	}
}

pub fn usage() -> String {
	let defaults = Cli::parse_from(["cadence"]);
	format!("{USAGE}\ndefault\n{}", defaults.summary())
}
