//! Workload partitioning
//!
//! Splits a validated configuration's memory ranges into per-thread
//! partition descriptors. All divisions here are integral by
//! construction of the validated configuration; a non-integral result
//! is a validation defect, not a runtime condition.

// Imports
use crate::config::{BenchmarkConfig, Mode};

/// Per-thread workload descriptor, recomputed for each run.
///
/// Addresses are offsets into the backing regions; the execution engine
/// adds the region base.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartitionDescriptor {
	/// Thread index within the workload
	pub thread_idx: usize,

	/// Offset of this thread's partition within the PMem region
	pub partition_offset: u64,

	/// Size of this thread's partition
	pub partition_size: u64,

	/// Number of threads sharing this partition's address range
	pub threads_per_partition: u64,

	/// Offset of this thread's DRAM partition, 0 when unused
	pub dram_partition_offset: u64,

	/// Size of this thread's DRAM partition, 0 when unused
	pub dram_partition_size: u64,

	/// Number of chunks this thread completes
	pub chunk_count: u64,

	/// Number of operations per chunk
	pub ops_per_chunk: u64,
}

/// Partitions `config`'s memory ranges across its threads
pub fn partition(config: &BenchmarkConfig) -> Vec<PartitionDescriptor> {
	let partitions = config.effective_partitions();
	let threads_per_partition = config.number_threads / partitions;
	let partition_size = config.memory_range / partitions;

	// The DRAM range is only partitioned when some access is actually
	// directed at it, either via the operation ratio or a custom chain
	let dram_partition_size = match config.contains_dram_op() {
		true => config.dram_memory_range / partitions,
		false => 0,
	};

	let ops_per_chunk = config.min_io_chunk_size / config.access_size;
	let chunk_count = match config.exec_mode {
		// Sequential modes cover the full partition exactly once
		Mode::Sequential | Mode::SequentialDesc => partition_size / config.min_io_chunk_size,

		// Count-bounded modes split the operation budget evenly across
		// threads; a remainder below one chunk is not scheduled
		Mode::Random | Mode::Custom =>
			(config.effective_number_operations() / config.number_threads) / ops_per_chunk,
	};

	(0..config.number_threads as usize)
		.map(|thread_idx| {
			let partition_idx = thread_idx as u64 / threads_per_partition;
			PartitionDescriptor {
				thread_idx,
				partition_offset: partition_idx * partition_size,
				partition_size,
				threads_per_partition,
				dram_partition_offset: partition_idx * dram_partition_size,
				dram_partition_size,
				chunk_count,
				ops_per_chunk,
			}
		})
		.collect()
}
