//! Periodic processing on top of the record database.
//!
//! - [`ProcessRecord`]: a command record plus a scheduler worker that
//!   processes every record in its [`WorkSet`] once per tick.
//! - [`ArrayGenerator`]: a worker that rewrites an array record as fast as
//!   it can and reports throughput.
//! - [`ArrayMonitor`]: an async consumer checking the generated arrays.
//! - [`add_record`] / [`remove_record`] / [`trace_record`]: control records
//!   for the shell.

mod command;
mod control;
mod error;
mod generator;
mod monitor;
mod scheduler;
mod throughput;
mod workset;

pub use command::{CommandKind, CommandOutcome, run_command};
pub use control::{add_record, remove_record, trace_record};
pub use error::{GenerateError, MonitorError};
pub use generator::{ArrayGenerator, generator_delay};
pub use monitor::{ArrayMonitor, LOCAL_PROVIDER, MonitorCounts, MonitorOptions};
pub use scheduler::{DEFAULT_SCHEDULER_DELAY, ProcessRecord, SchedulerCounts, SchedulerStats, scheduler_delay};
pub use throughput::{ThroughputMeter, ThroughputReport};
pub use workset::WorkSet;
