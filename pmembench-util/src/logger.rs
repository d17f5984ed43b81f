//! Logger

// Imports
use {
	std::{env, fs, path::Path},
	tracing_subscriber::prelude::*,
};

/// Helpers for output before the logger is initialized
pub mod pre_init {
	// Imports
	use std::env;

	/// Outputs a debug message before the logger is initialized.
	///
	/// Only emitted when `RUST_LOG_PRE_INIT` is set, since the usual
	/// filtering directives aren't available yet.
	pub fn debug(msg: String) {
		if env::var_os("RUST_LOG_PRE_INIT").is_some() {
			eprintln!("[pre-init] {msg}");
		}
	}
}

/// Initializes the logger.
///
/// Logs to stderr, filtered by `RUST_LOG`, and optionally to `log_file`,
/// filtered by `RUST_LOG_FILE`.
pub fn init(log_file: Option<&Path>, log_file_append: bool) {
	let stderr_layer = tracing_subscriber::fmt::layer()
		.with_writer(std::io::stderr)
		.with_filter(env_filter("RUST_LOG", "info"));

	let file_layer = log_file.and_then(|path| {
		let file = fs::OpenOptions::new()
			.create(true)
			.write(true)
			.append(log_file_append)
			.truncate(!log_file_append)
			.open(path);
		match file {
			Ok(file) => {
				let layer = tracing_subscriber::fmt::layer()
					.with_writer(file)
					.with_ansi(false)
					.with_filter(env_filter("RUST_LOG_FILE", "debug"));
				Some(layer)
			},
			Err(err) => {
				eprintln!("Unable to open log file {path:?}: {err}");
				None
			},
		}
	});

	tracing_subscriber::registry()
		.with(stderr_layer)
		.with(file_layer)
		.init();
}

/// Creates an env filter from `env_var`, defaulting to `default` directives
fn env_filter(env_var: &str, default: &str) -> tracing_subscriber::EnvFilter {
	let directives = env::var(env_var).unwrap_or_else(|_| default.to_owned());
	tracing_subscriber::EnvFilter::new(directives)
}
