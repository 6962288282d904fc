//! Optional TOML configuration.
//!
//! ```toml
//! log_filter = "cadence_engine=debug,info"
//! monitor_report_secs = 2.0
//! monitor_queue_size = 32
//! startup = [
//!     "processRecord sched 1.0",
//!     "dbcmd sched add arrayPerformance",
//! ]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("I/O error reading {path}: {error}")]
	Io { path: PathBuf, error: std::io::Error },
	#[error("invalid config: {0}")]
	Parse(#[from] toml::de::Error),
	#[error("monitor_report_secs must be a positive number of seconds, got {0}")]
	ReportInterval(f64),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
	/// Shell lines run before the console starts.
	pub startup: Vec<String>,
	/// `EnvFilter` directives; the environment still wins.
	pub log_filter: Option<String>,
	pub monitor_report_secs: Option<f64>,
	pub monitor_queue_size: Option<usize>,
}

impl Config {
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let text = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::parse(&text)
	}

	pub fn parse(text: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(text)?;
		if let Some(secs) = config.monitor_report_secs {
			if !(secs > 0.0 && secs.is_finite()) {
				return Err(ConfigError::ReportInterval(secs));
			}
		}
		Ok(config)
	}

	pub fn monitor_report_interval(&self) -> Option<Duration> {
		self.monitor_report_secs.map(Duration::from_secs_f64)
	}
}
