//! Execution engine
//!
//! Fork-join driver for a single run: one worker per configured thread,
//! each executing its partition descriptor's share of the workload and
//! recording chunk timings. All state a run needs travels in an explicit
//! [`ExecutionContext`]; two contexts never interfere.

// Imports
use {
	crate::{
		access::{AccessError, AccessPrimitive, AccessSpan},
		config::{BenchmarkConfig, Mode, Operation, RandomDistribution},
		numa::NumaTopology,
		ops::{CustomOp, MemoryTier},
		partition::PartitionDescriptor,
		result::{ChunkRecord, ThreadMeasurement},
	},
	rand::{
		distributions::{Distribution, Uniform},
		rngs::SmallRng,
		Rng,
		SeedableRng,
	},
	rand_distr::Zipf,
	std::{
		thread,
		time::{Duration, Instant},
	},
};

/// Run error
#[derive(Debug)]
#[derive(thiserror::Error)]
pub enum RunError {
	/// A memory access failed
	#[error("Memory access failed")]
	Access(#[from] AccessError),

	/// The Zipf distribution could not be built
	#[error("Invalid Zipf distribution over {slots} slots with exponent {alpha}")]
	Distribution { slots: u64, alpha: f64 },

	/// A chain operation targets DRAM but no DRAM region exists
	#[error("Operation targets DRAM but the run has no DRAM region")]
	MissingDramRegion,

	/// A worker thread panicked
	#[error("Worker thread panicked")]
	WorkerPanicked,
}

/// Everything one run executes against.
///
/// Built fresh per run so concurrent runs share nothing.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
	/// Base seed; worker `i` derives its stream from `run_seed + i`
	run_seed: u64,

	/// Topology used for thread placement
	topology: NumaTopology,
}

impl ExecutionContext {
	/// Creates a context
	pub fn new(run_seed: u64, topology: NumaTopology) -> Self {
		Self { run_seed, topology }
	}

	/// Executes `config` against the given regions, one worker per
	/// descriptor, and returns all thread measurements in thread order
	pub fn run(
		&self,
		config: &BenchmarkConfig,
		pmem: AccessSpan,
		dram: Option<AccessSpan>,
		descriptors: &[PartitionDescriptor],
		access: &dyn AccessPrimitive,
	) -> Result<Vec<ThreadMeasurement>, RunError> {
		// A single origin so chunk timestamps are comparable across threads
		let origin = Instant::now();
		let deadline = config.run_time.map(Duration::from_secs);

		let results = thread::scope(|s| {
			let handles = descriptors
				.iter()
				.map(|descriptor| {
					let worker = Worker {
						config,
						descriptor,
						pmem: pmem.slice(descriptor.partition_offset, descriptor.partition_size),
						dram: dram.filter(|_| descriptor.dram_partition_size != 0).map(|dram| {
							dram.slice(descriptor.dram_partition_offset, descriptor.dram_partition_size)
						}),
						access,
						topology: &self.topology,
						rng: SmallRng::seed_from_u64(self.run_seed.wrapping_add(descriptor.thread_idx as u64)),
						origin,
						deadline,
						measurement: ThreadMeasurement::default(),
					};
					s.spawn(move || worker.run())
				})
				.collect::<Vec<_>>();

			handles
				.into_iter()
				.map(|handle| handle.join())
				.collect::<Vec<_>>()
		});

		results
			.into_iter()
			.map(|result| result.map_err(|_| RunError::WorkerPanicked)?)
			.collect()
	}
}

/// Slot sampler for random access
enum SlotPicker {
	/// Uniform over all slots
	Uniform(Uniform<u64>),

	/// Zipf-skewed, hottest slots first
	Zipf(Zipf<f64>),
}

impl SlotPicker {
	/// Builds the picker `config` asks for over `slots` slots
	fn new(config: &BenchmarkConfig, slots: u64) -> Result<Self, RunError> {
		match config.random_distribution {
			RandomDistribution::Uniform => Ok(Self::Uniform(Uniform::from(0..slots))),
			RandomDistribution::Zipf => {
				let zipf = Zipf::new(slots, config.zipf_alpha).map_err(|_| RunError::Distribution {
					slots,
					alpha: config.zipf_alpha,
				})?;
				Ok(Self::Zipf(zipf))
			},
		}
	}

	/// Samples a slot index in `0..slots`
	fn pick(&self, rng: &mut SmallRng) -> u64 {
		match self {
			Self::Uniform(uniform) => uniform.sample(rng),
			// Zipf ranks start at 1
			Self::Zipf(zipf) => zipf.sample(rng) as u64 - 1,
		}
	}
}

/// One worker thread's execution state
struct Worker<'run> {
	/// Run configuration
	config: &'run BenchmarkConfig,

	/// This thread's partition descriptor
	descriptor: &'run PartitionDescriptor,

	/// This thread's PMem partition
	pmem: AccessSpan,

	/// This thread's DRAM partition, when one exists
	dram: Option<AccessSpan>,

	/// Access primitive shared by the run
	access: &'run dyn AccessPrimitive,

	/// Topology for thread placement
	topology: &'run NumaTopology,

	/// This thread's private random stream
	rng: SmallRng,

	/// Run origin shared by all workers
	origin: Instant,

	/// Wall-clock budget, when time-bounded
	deadline: Option<Duration>,

	/// Accumulated measurements
	measurement: ThreadMeasurement,
}

impl Worker<'_> {
	/// Executes this worker's share of the run
	fn run(mut self) -> Result<ThreadMeasurement, RunError> {
		self.topology.pin_current_thread(self.config.numa_pattern);

		match self.config.exec_mode {
			Mode::Sequential => self.run_sequential(false)?,
			Mode::SequentialDesc => self.run_sequential(true)?,
			Mode::Random => self.run_random()?,
			Mode::Custom => self.run_custom()?,
		}

		Ok(self.measurement)
	}

	/// Whether the wall-clock budget is exhausted
	fn deadline_reached(&self) -> bool {
		self.deadline
			.is_some_and(|deadline| self.origin.elapsed() >= deadline)
	}

	/// Nanoseconds since the run origin
	fn now_ns(&self) -> u64 {
		self.origin.elapsed().as_nanos() as u64
	}

	/// Records one completed chunk and applies the configured pause
	fn finish_chunk(&mut self, start_ns: u64, bytes: u64, completed: u64) {
		self.measurement.chunks.push(ChunkRecord {
			start_ns,
			end_ns: self.now_ns(),
			bytes,
		});

		let config = self.config;
		if config.pause_frequency != 0 && completed % config.pause_frequency == 0 {
			thread::sleep(Duration::from_micros(config.pause_length_us));
		}
	}

	/// Executes the configured fixed operation against `span`
	fn execute_fixed(&mut self, span: AccessSpan) -> Result<(), RunError> {
		match self.config.operation {
			Operation::Read => {
				self.access.read(span)?;
			},
			Operation::Write => self.access.write(span, self.config.persist_instruction)?,
		}
		Ok(())
	}

	/// Walks every chunk of the partition in address order, repeating
	/// until the deadline when one is set
	fn run_sequential(&mut self, descending: bool) -> Result<(), RunError> {
		let config = self.config;
		let descriptor = self.descriptor;
		let chunk_size = descriptor.ops_per_chunk * config.access_size;
		let mut completed = 0u64;

		loop {
			for chunk_idx in 0..descriptor.chunk_count {
				let chunk_idx = match descending {
					true => descriptor.chunk_count - 1 - chunk_idx,
					false => chunk_idx,
				};
				let chunk_begin = chunk_idx * chunk_size;

				let start_ns = self.now_ns();
				for op_idx in 0..descriptor.ops_per_chunk {
					let op_idx = match descending {
						true => descriptor.ops_per_chunk - 1 - op_idx,
						false => op_idx,
					};
					let span = self
						.pmem
						.slice(chunk_begin + op_idx * config.access_size, config.access_size);
					self.execute_fixed(span)?;
				}

				completed += 1;
				self.finish_chunk(start_ns, chunk_size, completed);
				if self.deadline_reached() {
					return Ok(());
				}
			}

			if self.deadline.is_none() {
				return Ok(());
			}
		}
	}

	/// Executes the operation budget at randomly sampled addresses
	fn run_random(&mut self) -> Result<(), RunError> {
		let config = self.config;
		let descriptor = self.descriptor;
		let access_size = config.access_size;

		let pmem_picker = SlotPicker::new(config, self.pmem.len as u64 / access_size)?;
		let dram_picker = self
			.dram
			.map(|dram| SlotPicker::new(config, dram.len as u64 / access_size))
			.transpose()?;

		let chunk_bytes = descriptor.ops_per_chunk * access_size;
		let mut completed = 0u64;
		loop {
			for _ in 0..descriptor.chunk_count {
				let start_ns = self.now_ns();
				for _ in 0..descriptor.ops_per_chunk {
					let use_dram = dram_picker.is_some() &&
						self.rng.gen::<f64>() < config.dram_operation_ratio;
					let (span, picker) = match use_dram {
						true => (
							self.dram.ok_or(RunError::MissingDramRegion)?,
							dram_picker.as_ref().ok_or(RunError::MissingDramRegion)?,
						),
						false => (self.pmem, &pmem_picker),
					};

					let slot = picker.pick(&mut self.rng);
					self.execute_fixed(span.slice(slot * access_size, access_size))?;
				}

				completed += 1;
				self.finish_chunk(start_ns, chunk_bytes, completed);
				if self.deadline_reached() {
					return Ok(());
				}
			}

			if self.deadline.is_none() {
				return Ok(());
			}
		}
	}

	/// Executes the custom operation chain, once per budgeted operation
	fn run_custom(&mut self) -> Result<(), RunError> {
		let config = self.config;
		let descriptor = self.descriptor;
		let chain = config.custom_operations.as_slice();
		let chain_bytes = chain.iter().map(|op| op.size).sum::<u64>();
		let chunk_bytes = descriptor.ops_per_chunk * chain_bytes;

		// Chain state: the last read value feeds the next read address,
		// the last read offset per tier anchors relative writes
		let mut dependent = self.rng.gen::<u64>();
		let mut last_read = [0u64; 2];

		let mut executed = 0u64;
		let mut completed = 0u64;
		loop {
			for _ in 0..descriptor.chunk_count {
				let start_ns = self.now_ns();
				for _ in 0..descriptor.ops_per_chunk {
					let sample = config.latency_sample_frequency != 0 &&
						executed % config.latency_sample_frequency == 0;
					let chain_start = sample.then(Instant::now);

					self.execute_chain(chain, &mut dependent, &mut last_read)?;
					executed += 1;

					if let Some(chain_start) = chain_start {
						self.measurement
							.latencies_ns
							.push(chain_start.elapsed().as_nanos() as u64);
					}
				}

				completed += 1;
				self.finish_chunk(start_ns, chunk_bytes, completed);
				if self.deadline_reached() {
					return Ok(());
				}
			}

			if self.deadline.is_none() {
				return Ok(());
			}
		}
	}

	/// Executes one pass over the chain
	fn execute_chain(
		&mut self,
		chain: &[CustomOp],
		dependent: &mut u64,
		last_read: &mut [u64; 2],
	) -> Result<(), RunError> {
		for op in chain {
			let span = match op.tier {
				MemoryTier::PMem => self.pmem,
				MemoryTier::Dram => self.dram.ok_or(RunError::MissingDramRegion)?,
			};
			let tier_idx = match op.tier {
				MemoryTier::PMem => 0,
				MemoryTier::Dram => 1,
			};
			let range = span.len as u64;

			match op.kind {
				Operation::Read => {
					// Data-dependent addressing: the previous read's value
					// perturbs where the next read lands
					let slots = range / op.size;
					let slot = dependent.wrapping_add(self.rng.gen::<u64>()) % slots;
					let offset = slot * op.size;

					*dependent = self.access.read(span.slice(offset, op.size))?;
					last_read[tier_idx] = offset;
				},
				Operation::Write => {
					let offset = (last_read[tier_idx] as i64 + op.offset).rem_euclid(range as i64) as u64;
					let offset = offset.min(range - op.size);
					self.access.write(span.slice(offset, op.size), op.persist)?;
				},
			}
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use {
		super::*,
		crate::{
			memory::{MemoryRegion, RegionSource},
			ops,
			partition,
		},
		pmembench_util::size::BYTES_IN_MIB,
		std::sync::atomic::{AtomicU64, Ordering},
	};

	/// Access primitive that counts operations instead of touching memory
	#[derive(Default)]
	struct CountingAccess {
		reads:  AtomicU64,
		writes: AtomicU64,
	}

	impl AccessPrimitive for CountingAccess {
		fn read(&self, span: AccessSpan) -> Result<u64, AccessError> {
			assert!(!span.ptr.is_null());
			self.reads.fetch_add(1, Ordering::Relaxed);
			Ok(span.len as u64)
		}

		fn write(&self, span: AccessSpan, _persist: crate::config::PersistInstruction) -> Result<(), AccessError> {
			assert!(!span.ptr.is_null());
			self.writes.fetch_add(1, Ordering::Relaxed);
			Ok(())
		}
	}

	fn run_counting(config: &BenchmarkConfig) -> (CountingAccess, Vec<ThreadMeasurement>) {
		let pmem = MemoryRegion::acquire(RegionSource::Anonymous, config.memory_range).unwrap();
		let dram = (config.dram_memory_range != 0)
			.then(|| MemoryRegion::acquire(RegionSource::Anonymous, config.dram_memory_range).unwrap());

		let descriptors = partition::partition(config);
		let access = CountingAccess::default();
		let context = ExecutionContext::new(42, NumaTopology::local());
		let measurements = context
			.run(
				config,
				pmem.span(),
				dram.as_ref().map(MemoryRegion::span),
				&descriptors,
				&access,
			)
			.unwrap();

		(access, measurements)
	}

	fn base_config() -> BenchmarkConfig {
		BenchmarkConfig {
			memory_range: 4 * BYTES_IN_MIB,
			access_size: 256,
			min_io_chunk_size: BYTES_IN_MIB,
			..BenchmarkConfig::default()
		}
	}

	#[test]
	fn sequential_covers_partition_once() {
		let config = BenchmarkConfig {
			number_threads: 2,
			..base_config()
		};
		let (access, measurements) = run_counting(&config);

		// 2 MiB per thread at 256 B per op
		assert_eq!(access.reads.load(Ordering::Relaxed), 2 * (2 * BYTES_IN_MIB / 256));
		assert_eq!(measurements.len(), 2);
		for measurement in &measurements {
			assert_eq!(measurement.total_bytes(), 2 * BYTES_IN_MIB);
			assert_eq!(measurement.chunks.len(), 2);
		}
	}

	#[test]
	fn sequential_descending_matches_ascending_volume() {
		let config = BenchmarkConfig {
			exec_mode: Mode::SequentialDesc,
			number_threads: 1,
			..base_config()
		};
		let (access, measurements) = run_counting(&config);

		assert_eq!(access.reads.load(Ordering::Relaxed), 4 * BYTES_IN_MIB / 256);
		assert_eq!(measurements[0].total_bytes(), 4 * BYTES_IN_MIB);
	}

	#[test]
	fn random_respects_operation_budget() {
		let config = BenchmarkConfig {
			exec_mode: Mode::Random,
			number_threads: 2,
			number_operations: Some(16384),
			..base_config()
		};
		let (access, measurements) = run_counting(&config);

		assert_eq!(access.reads.load(Ordering::Relaxed), 16384);
		for measurement in &measurements {
			assert_eq!(measurement.total_bytes(), 8192 * 256);
		}
	}

	#[test]
	fn random_write_uses_write_primitive() {
		let config = BenchmarkConfig {
			exec_mode: Mode::Random,
			operation: Operation::Write,
			number_threads: 1,
			number_operations: Some(4096),
			..base_config()
		};
		let (access, _) = run_counting(&config);

		assert_eq!(access.reads.load(Ordering::Relaxed), 0);
		assert_eq!(access.writes.load(Ordering::Relaxed), 4096);
	}

	#[test]
	fn zipf_sampling_stays_in_bounds() {
		let config = BenchmarkConfig {
			exec_mode: Mode::Random,
			random_distribution: RandomDistribution::Zipf,
			zipf_alpha: 0.9,
			number_threads: 1,
			number_operations: Some(8192),
			..base_config()
		};
		// In-bounds slicing is asserted inside the span itself
		let (access, _) = run_counting(&config);
		assert_eq!(access.reads.load(Ordering::Relaxed), 8192);
	}

	#[test]
	fn custom_chain_execution_and_latency_sampling() {
		let config = BenchmarkConfig {
			exec_mode: Mode::Custom,
			custom_operations: ops::parse_chain("rp_256,wp_128_cache").unwrap(),
			number_threads: 1,
			number_operations: Some(4096),
			latency_sample_frequency: 256,
			min_io_chunk_size: 256 * 1024,
			..base_config()
		};
		let (access, measurements) = run_counting(&config);

		assert_eq!(access.reads.load(Ordering::Relaxed), 4096);
		assert_eq!(access.writes.load(Ordering::Relaxed), 4096);
		// 384 B per chain pass
		assert_eq!(measurements[0].total_bytes(), 4096 * (256 + 128));
		assert_eq!(measurements[0].latencies_ns.len(), 4096 / 256);
	}

	#[test]
	fn custom_chain_reaches_dram_tier() {
		let config = BenchmarkConfig {
			exec_mode: Mode::Custom,
			custom_operations: ops::parse_chain("r_256,rd_64").unwrap(),
			dram_memory_range: BYTES_IN_MIB,
			number_threads: 1,
			number_operations: Some(1024),
			min_io_chunk_size: 256 * 1024,
			..base_config()
		};
		let (access, _) = run_counting(&config);

		assert_eq!(access.reads.load(Ordering::Relaxed), 2 * 1024);
	}

	#[test]
	fn time_bounded_run_stops() {
		let config = BenchmarkConfig {
			number_threads: 1,
			run_time: Some(0),
			..base_config()
		};
		// A zero-second budget stops after the first chunk
		let (_, measurements) = run_counting(&config);
		assert_eq!(measurements[0].chunks.len(), 1);
	}
}
