//! Arguments

// Imports
use std::path::PathBuf;

/// Arguments
#[derive(Debug)]
#[derive(clap::Parser)]
pub struct Args {
	/// Log file
	///
	/// Specifies a file to perform verbose logging to.
	/// You can use `RUST_LOG_FILE` to set filtering options
	#[clap(long = "log-file")]
	pub log_file: Option<PathBuf>,

	/// Whether to append to the log file
	#[clap(long = "log-file-append")]
	pub log_file_append: bool,

	/// Benchmark definition file
	pub config_file: PathBuf,

	/// Directory holding the persistent memory mount
	///
	/// Benchmarked regions are backed by files created here.
	/// When omitted, regions use anonymous memory instead.
	#[clap(long = "pmem-dir")]
	pub pmem_dir: Option<PathBuf>,

	/// Output file
	#[clap(long = "output")]
	pub output_file: Option<PathBuf>,

	/// Base seed for all random access streams
	#[clap(long = "run-seed", default_value_t = 42)]
	pub run_seed: u64,

	/// NUMA nodes near the benchmarked memory
	#[clap(long = "near-numa-nodes", value_delimiter = ',', default_value = "0")]
	pub near_numa_nodes: Vec<usize>,

	/// NUMA nodes far from the benchmarked memory
	#[clap(long = "far-numa-nodes", value_delimiter = ',')]
	pub far_numa_nodes: Vec<usize>,
}
