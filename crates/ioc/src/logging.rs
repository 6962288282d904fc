use std::path::PathBuf;

/// Installs the global subscriber.
///
/// Filter precedence: `CADENCE_LOG`, then `RUST_LOG`, then the config file's
/// `log_filter`, then `info` (`debug` with `-v`). When `CADENCE_LOG_DIR` is
/// set, events go to a per-process file there instead of stderr.
pub fn setup_tracing(verbose: bool, config_filter: Option<&str>) {
	use std::fs::OpenOptions;

	use tracing_subscriber::EnvFilter;
	use tracing_subscriber::fmt::format::FmtSpan;
	use tracing_subscriber::prelude::*;

	let filter = || {
		EnvFilter::try_from_env("CADENCE_LOG")
			.or_else(|_| EnvFilter::try_from_default_env())
			.or_else(|_| config_filter.map_or_else(|| Err(()), |directives| EnvFilter::try_new(directives).map_err(drop)))
			.unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }))
	};

	if let Some(log_dir) = std::env::var_os("CADENCE_LOG_DIR").map(PathBuf::from) {
		if std::fs::create_dir_all(&log_dir).is_ok() {
			let log_path = log_dir.join(format!("cadence.{}.log", std::process::id()));
			if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
				let file_layer = tracing_subscriber::fmt::layer()
					.with_writer(file)
					.with_ansi(false)
					.with_span_events(FmtSpan::CLOSE)
					.with_target(true);
				tracing_subscriber::registry().with(filter()).with(file_layer).init();
				tracing::info!(path = ?log_path, "ioc.tracing_to_file");
				return;
			}
		}
	}

	tracing_subscriber::fmt().with_env_filter(filter()).with_writer(std::io::stderr).init();
}
