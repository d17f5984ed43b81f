//! Persistent memory benchmark runner (`pmembench`)

// Modules
mod args;

// Imports
use {
	self::args::Args,
	anyhow::Context,
	clap::Parser,
	pmembench::{
		suite::SuiteError,
		BenchmarkSuite,
		NumaTopology,
	},
	pmembench_util::logger,
	std::fs,
};

fn main() -> Result<(), anyhow::Error> {
	// Get arguments
	let args = Args::parse();
	logger::pre_init::debug(format!("Args: {args:?}"));

	// Initialize logging
	logger::init(args.log_file.as_deref(), args.log_file_append);

	// Read the benchmark definition file
	let doc = {
		let config = fs::read_to_string(&args.config_file).context("Unable to read benchmark file")?;
		serde_yaml::from_str::<serde_yaml::Value>(&config).context("Unable to parse benchmark file")?
	};

	// Run the suite
	let topology = NumaTopology::new(args.near_numa_nodes.clone(), args.far_numa_nodes.clone());
	let suite = BenchmarkSuite::new(topology, args.run_seed, args.pmem_dir.clone());
	let (results, failure) = match suite.run(&doc) {
		Ok(results) => (results, None),
		// An aborted suite still flushes whatever finished before it
		Err(SuiteError { name, completed, source }) => {
			tracing::error!(%name, %source, "Benchmark suite aborted");
			(completed, Some(source))
		},
	};

	// Flush the results
	let output = serde_json::to_string_pretty(&results).context("Unable to serialize results")?;
	match &args.output_file {
		Some(output_file) => fs::write(output_file, output).context("Unable to write output file")?,
		None => println!("{output}"),
	}

	match failure {
		Some(source) => Err(anyhow::Error::new(source).context("Benchmark suite aborted")),
		None => Ok(()),
	}
}
