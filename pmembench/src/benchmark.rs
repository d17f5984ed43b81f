//! Benchmarks
//!
//! A benchmark is one fully-resolved workload: a name plus the validated
//! configuration(s) of a single matrix combination. Running one acquires
//! its memory regions, partitions them, drives the execution engine and
//! aggregates the measurements; the regions are released when the run
//! ends.

// Imports
use {
	crate::{
		access::MemoryAccess,
		config::BenchmarkConfig,
		exec::{ExecutionContext, RunError},
		memory::{MemoryRegion, RegionSource, ResourceError},
		partition,
		result::{self, RunResult},
	},
	rand::Rng,
	std::path::{Path, PathBuf},
};

/// Benchmark error
#[derive(Debug)]
#[derive(thiserror::Error)]
pub enum BenchmarkError {
	/// Unable to acquire a memory region
	#[error("Unable to acquire memory region")]
	Resource(#[from] ResourceError),

	/// The run itself failed
	#[error("Benchmark run failed")]
	Run(#[from] RunError),
}

/// A fully-resolved benchmark
#[derive(Clone, Debug)]
pub enum Benchmark {
	/// One workload
	Single {
		/// Definition name
		name: String,

		/// Workload configuration
		config: BenchmarkConfig,
	},

	/// Two workloads executed concurrently against separate regions
	Parallel {
		/// Definition name
		name: String,

		/// The two sub-workload names, in declaration order
		sub_names: [String; 2],

		/// The two workload configurations
		configs: Box<(BenchmarkConfig, BenchmarkConfig)>,
	},
}

impl Benchmark {
	/// Returns this benchmark's definition name
	pub fn name(&self) -> &str {
		match self {
			Self::Single { name, .. } | Self::Parallel { name, .. } => name,
		}
	}

	/// Returns this benchmark's type tag for reporting
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Single { .. } => "single",
			Self::Parallel { .. } => "parallel",
		}
	}

	/// Returns the field names varied by this benchmark's matrix
	pub fn matrix_args(&self) -> &[String] {
		match self {
			Self::Single { config, .. } => &config.matrix_args,
			Self::Parallel { configs, .. } => &configs.0.matrix_args,
		}
	}

	/// Runs this benchmark to completion
	pub fn run(&self, context: &ExecutionContext, pmem_dir: Option<&Path>) -> Result<BenchmarkRun, BenchmarkError> {
		match self {
			Self::Single { name, config } => {
				tracing::info!(%name, "Running benchmark");
				let workload = Workload::acquire(config, pmem_dir)?;
				let result = workload.run(context)?;
				Ok(BenchmarkRun::Single(WorkloadRun {
					config: config.clone(),
					result,
				}))
			},
			Self::Parallel { name, sub_names, configs } => {
				tracing::info!(%name, ?sub_names, "Running parallel benchmark");
				let (first_config, second_config) = &**configs;

				// Both regions are held for the whole joint run
				let first = Workload::acquire(first_config, pmem_dir)?;
				let second = Workload::acquire(second_config, pmem_dir)?;

				let (first_result, second_result) = std::thread::scope(|s| {
					let first_handle = s.spawn(|| first.run(context));
					let second_handle = s.spawn(|| second.run(context));
					let first_result = first_handle.join().map_err(|_| RunError::WorkerPanicked);
					let second_result = second_handle.join().map_err(|_| RunError::WorkerPanicked);
					(first_result, second_result)
				});

				Ok(BenchmarkRun::Parallel([
					WorkloadRun {
						config: first_config.clone(),
						result: first_result??,
					},
					WorkloadRun {
						config: second_config.clone(),
						result: second_result??,
					},
				]))
			},
		}
	}
}

/// One workload's completed run
#[derive(Clone, Debug)]
#[derive(serde::Serialize)]
pub struct WorkloadRun {
	/// The configuration that ran
	pub config: BenchmarkConfig,

	/// Aggregated results
	#[serde(flatten)]
	pub result: RunResult,
}

/// A completed benchmark run
#[derive(Clone, Debug)]
pub enum BenchmarkRun {
	/// Single workload results
	Single(WorkloadRun),

	/// Parallel workload results, in sub-workload order
	Parallel([WorkloadRun; 2]),
}

/// A workload with its regions acquired and prepared
struct Workload<'bench> {
	/// Workload configuration
	config: &'bench BenchmarkConfig,

	/// Persistent region
	pmem: MemoryRegion,

	/// Volatile region, when the workload touches DRAM
	dram: Option<MemoryRegion>,
}

impl<'bench> Workload<'bench> {
	/// Acquires and prepares the regions `config` needs
	fn acquire(config: &'bench BenchmarkConfig, pmem_dir: Option<&Path>) -> Result<Self, BenchmarkError> {
		let source = match pmem_dir {
			Some(dir) => RegionSource::File(region_file_path(dir)),
			None => RegionSource::Anonymous,
		};

		let mut pmem = MemoryRegion::acquire(source, config.memory_range)?;
		if config.prefault_file {
			pmem.prefault();
		}
		if config.contains_read_op() {
			pmem.fill_with_pattern();
		}

		let dram = config
			.contains_dram_op()
			.then(|| {
				let mut dram = MemoryRegion::acquire(RegionSource::Anonymous, config.dram_memory_range)?;
				dram.prefault();
				if config.contains_read_op() {
					dram.fill_with_pattern();
				}
				Ok::<_, ResourceError>(dram)
			})
			.transpose()?;

		Ok(Self { config, pmem, dram })
	}

	/// Runs the workload, releasing the regions on return
	fn run(self, context: &ExecutionContext) -> Result<RunResult, BenchmarkError> {
		let descriptors = partition::partition(self.config);
		let measurements = context.run(
			self.config,
			self.pmem.span(),
			self.dram.as_ref().map(MemoryRegion::span),
			&descriptors,
			&MemoryAccess,
		)?;

		Ok(result::aggregate(&measurements))
	}
}

/// Picks a fresh backing-file path under `dir`
fn region_file_path(dir: &Path) -> PathBuf {
	let nonce = rand::thread_rng().gen::<u64>();
	dir.join(format!("pmembench-{nonce:016x}.bin"))
}
