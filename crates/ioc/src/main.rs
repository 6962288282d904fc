//! Cadence array performance server.
//!
//! Starts one or more generation workers rewriting large array records, array
//! monitors checking what they publish, and a registrar console on stdin.
//! Type `exit` (or press Ctrl-C) to stop.

mod cli;
mod config;
mod logging;

use anyhow::{Context, bail};
use cadence_db::Registry;
use cadence_engine::{ArrayMonitor, LOCAL_PROVIDER, MonitorOptions, generator_delay};
use cadence_shell::Shell;
use tokio::sync::mpsc;
use tracing::info;

use crate::cli::Cli;
use crate::config::Config;

/// Name of the trace control record every server creates.
const TRACE_RECORD: &str = "traceRecordPGRPC";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let Some(cli) = Cli::parse_or_usage(std::env::args_os()) else {
		return Ok(());
	};
	let config = match &cli.config {
		Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
		None => Config::default(),
	};
	logging::setup_tracing(cli.verbose, config.log_filter.as_deref());

	println!("{}", cli.summary());
	if cli.provider != LOCAL_PROVIDER {
		bail!("provider {:?} is not supported: only \"{LOCAL_PROVIDER}\" is", cli.provider);
	}

	let registry = Registry::new();
	let mut shell = Shell::new(registry.clone());
	let monitors = match start(&cli, &config, &registry, &mut shell) {
		Ok(monitors) => monitors,
		Err(err) => {
			shutdown(shell, Vec::new()).await?;
			return Err(err);
		}
	};

	let failed = shell.run_script(config.startup.iter().map(String::as_str));
	if failed > 0 {
		tracing::warn!(failed, "ioc.startup_lines_failed");
	}

	let console_result = console(&mut shell).await;
	shutdown(shell, monitors).await?;
	console_result
}

fn start(cli: &Cli, config: &Config, registry: &Registry, shell: &mut Shell) -> anyhow::Result<Vec<ArrayMonitor>> {
	let delay = generator_delay(cli.delay);
	for index in 0..cli.generators() {
		let name = cli.generated_record(index);
		shell.add_array_generator(&name, cli.size, delay).with_context(|| format!("starting generator {name}"))?;
	}

	let mut options = MonitorOptions {
		use_queue: cli.use_queue,
		..MonitorOptions::default()
	};
	if let Some(interval) = config.monitor_report_interval() {
		options.report_interval = interval;
	}
	if let Some(queue_size) = config.monitor_queue_size {
		options.queue_size = queue_size;
	}
	let mut monitors = Vec::with_capacity(cli.monitors);
	for index in 0..cli.monitors {
		let name = cli.generated_record(index);
		monitors.push(ArrayMonitor::start(registry, &cli.provider, &name, options).with_context(|| format!("starting monitor on {name}"))?);
	}

	shell.add_trace_record(TRACE_RECORD)?;
	info!(generators = cli.generators(), monitors = monitors.len(), "ioc.started");
	Ok(monitors)
}

/// Reads stdin on a detached thread so a pending read never holds up exit.
fn stdin_lines() -> anyhow::Result<mpsc::UnboundedReceiver<std::io::Result<String>>> {
	let (tx, rx) = mpsc::unbounded_channel();
	std::thread::Builder::new()
		.name("cadence-console".to_string())
		.spawn(move || {
			for line in std::io::stdin().lines() {
				if tx.send(line).is_err() {
					break;
				}
			}
		})
		.context("spawning console reader")?;
	Ok(rx)
}

async fn console(shell: &mut Shell) -> anyhow::Result<()> {
	let mut lines = stdin_lines()?;
	println!("type exit to stop");
	loop {
		tokio::select! {
			signal = tokio::signal::ctrl_c() => {
				signal.context("listening for Ctrl-C")?;
				info!("ioc.interrupted");
				return Ok(());
			}
			line = lines.recv() => {
				let Some(line) = line.transpose().context("reading stdin")? else {
					info!("ioc.stdin_closed");
					return Ok(());
				};
				if line.trim() == "exit" {
					return Ok(());
				}
				match shell.execute(&line) {
					Ok(output) if !output.is_empty() => println!("{output}"),
					Ok(_) => {}
					Err(err) => eprintln!("{err}"),
				}
			}
		}
	}
}

async fn shutdown(mut shell: Shell, monitors: Vec<ArrayMonitor>) -> anyhow::Result<()> {
	for monitor in monitors {
		let name = monitor.record_name().to_string();
		let counts = monitor.stop().await;
		info!(record = %name, received = counts.received, inconsistent = counts.inconsistent, regressions = counts.regressions, overruns = counts.overruns, "ioc.monitor_stopped");
	}
	// Stopping waits for each worker to confirm; keep that off the async workers.
	let outcomes = tokio::task::spawn_blocking(move || shell.shutdown()).await.context("joining shutdown")?;
	for (name, outcome) in outcomes {
		info!(worker = %name, ?outcome, "ioc.worker_stopped");
	}
	Ok(())
}
