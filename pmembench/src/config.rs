//! Benchmark configuration

// Imports
use {
	crate::{
		numa::NumaTopology,
		ops,
		ops::{CustomOp, MemoryTier},
	},
	pmembench_util::size,
	serde_yaml::Mapping,
};

/// Cache line size in bytes.
///
/// The smallest unit of a single memory access.
pub const CACHE_LINE_SIZE: u64 = 64;

/// Default number of operations for random / custom execution
pub const DEFAULT_NUMBER_OPERATIONS: u64 = 100_000_000;

/// Execution mode
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[derive(serde::Serialize)]
pub enum Mode {
	/// Ascending sequential access over the partition
	#[serde(rename = "sequential")]
	Sequential,

	/// Descending sequential access over the partition
	#[serde(rename = "sequential_desc")]
	SequentialDesc,

	/// Random access, uniform or zipfian
	#[serde(rename = "random")]
	Random,

	/// User-defined operation chain
	#[serde(rename = "custom")]
	Custom,
}

impl Mode {
	/// Parses a mode from its config string
	pub fn from_config_str(s: &str) -> Option<Self> {
		match s {
			"sequential" | "sequential_asc" => Some(Self::Sequential),
			"sequential_desc" => Some(Self::SequentialDesc),
			"random" => Some(Self::Random),
			"custom" => Some(Self::Custom),
			_ => None,
		}
	}

	/// Returns whether this mode is one of the sequential modes
	pub fn is_sequential(self) -> bool {
		matches!(self, Self::Sequential | Self::SequentialDesc)
	}
}

/// Memory access operation
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[derive(serde::Serialize)]
pub enum Operation {
	#[serde(rename = "read")]
	Read,

	#[serde(rename = "write")]
	Write,
}

impl Operation {
	/// Parses an operation from its config string
	pub fn from_config_str(s: &str) -> Option<Self> {
		match s {
			"read" => Some(Self::Read),
			"write" => Some(Self::Write),
			_ => None,
		}
	}
}

/// Persistence strength applied after a write.
///
/// Trades durability latency against throughput.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[derive(serde::Serialize)]
pub enum PersistInstruction {
	/// Non-temporal write, bypassing the cache
	#[serde(rename = "nocache")]
	NoCache,

	/// Write back the cache line, keeping it cached
	#[serde(rename = "cache")]
	Cache,

	/// Write back and invalidate the cache line
	#[serde(rename = "cacheinv")]
	CacheInvalidate,

	/// No persistence, leave the line cached
	#[serde(rename = "none")]
	None,
}

impl PersistInstruction {
	/// Parses a persist instruction from its config string
	pub fn from_config_str(s: &str) -> Option<Self> {
		match s {
			"nocache" => Some(Self::NoCache),
			"cache" => Some(Self::Cache),
			"cacheinv" => Some(Self::CacheInvalidate),
			"none" => Some(Self::None),
			_ => None,
		}
	}
}

/// Random access distribution
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[derive(serde::Serialize)]
pub enum RandomDistribution {
	#[serde(rename = "uniform")]
	Uniform,

	#[serde(rename = "zipf")]
	Zipf,
}

impl RandomDistribution {
	/// Parses a random distribution from its config string
	pub fn from_config_str(s: &str) -> Option<Self> {
		match s {
			"uniform" => Some(Self::Uniform),
			"zipf" => Some(Self::Zipf),
			_ => None,
		}
	}
}

/// NUMA access pattern
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[derive(serde::Serialize)]
pub enum NumaPattern {
	/// Access memory on a near node
	#[serde(rename = "near")]
	Near,

	/// Access memory on a topologically far node
	#[serde(rename = "far")]
	Far,
}

impl NumaPattern {
	/// Parses a numa pattern from its config string
	pub fn from_config_str(s: &str) -> Option<Self> {
		match s {
			"near" => Some(Self::Near),
			"far" => Some(Self::Far),
			_ => None,
		}
	}
}

/// Configuration error
#[derive(Debug)]
#[derive(thiserror::Error)]
pub enum ConfigError {
	/// Unknown config entry
	#[error("Unknown config entry {key:?}")]
	UnknownKey { key: String },

	/// Invalid value for a config entry
	#[error("Invalid value for {key:?}: {reason}")]
	InvalidValue { key: String, reason: String },

	/// Invalid custom operation chain
	#[error("Invalid custom operation chain: {0}")]
	Chain(#[from] ops::ChainError),

	/// One or more violated invariants
	#[error("Invalid configuration: {}", violations.join("; "))]
	Invalid { violations: Vec<String> },

	/// Structurally invalid benchmark definition
	#[error("Invalid benchmark definition: {reason}")]
	Definition { reason: String },
}

/// A single workload's configuration.
///
/// Immutable once validated. Decoded from a key/value document tree
/// via [`BenchmarkConfig::decode`].
#[derive(Clone, Debug, PartialEq)]
#[derive(serde::Serialize)]
pub struct BenchmarkConfig {
	/// Size of an individual memory access, in bytes.
	///
	/// Must be a power of two and at least one cache line.
	pub access_size: u64,

	/// Total PMem memory range to benchmark against, in bytes.
	///
	/// Must be a multiple of `access_size`.
	pub memory_range: u64,

	/// Total DRAM memory range, in bytes. 0 disables the DRAM tier.
	pub dram_memory_range: u64,

	/// Fraction of random accesses directed at the DRAM region
	pub dram_operation_ratio: f64,

	/// Number of random / custom operations to perform.
	///
	/// Must not be set for sequential access.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub number_operations: Option<u64>,

	/// Number of threads to run the benchmark with
	pub number_threads: u64,

	/// Wall-clock run time budget in seconds, as an alternative
	/// termination condition to `number_operations`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub run_time: Option<u64>,

	/// Operation to perform. Ignored in custom mode.
	pub operation: Operation,

	/// Execution mode
	pub exec_mode: Mode,

	/// Persist instruction applied after each write
	pub persist_instruction: PersistInstruction,

	/// Number of disjoint partitions to split `memory_range` into.
	///
	/// 0 means one partition per thread. When smaller than
	/// `number_threads`, several threads share a partition's address
	/// range.
	pub number_partitions: u64,

	/// NUMA access pattern
	pub numa_pattern: NumaPattern,

	/// Distribution for random access
	pub random_distribution: RandomDistribution,

	/// Zipf skew factor
	pub zipf_alpha: f64,

	/// Custom operation chain, required iff `exec_mode` is custom
	#[serde(
		serialize_with = "serialize_custom_ops",
		skip_serializing_if = "Vec::is_empty"
	)]
	pub custom_operations: Vec<CustomOp>,

	/// Frequency in which to sample custom operation latency.
	///
	/// 0 disables sampling.
	pub latency_sample_frequency: u64,

	/// Whether to touch every page before timing starts
	pub prefault_file: bool,

	/// Whether to request transparent huge pages for the DRAM region.
	///
	/// Recorded for result labeling; the region capability treats it as
	/// a hint.
	pub dram_huge_pages: bool,

	/// Minimum size of an atomic work package handed to a thread
	pub min_io_chunk_size: u64,

	/// Chunks to complete between pauses. 0 disables pausing.
	pub pause_frequency: u64,

	/// Pause duration in microseconds
	pub pause_length_us: u64,

	/// Names of the fields varied by the benchmark matrix
	#[serde(skip)]
	pub matrix_args: Vec<String>,
}

impl Default for BenchmarkConfig {
	fn default() -> Self {
		Self {
			access_size:              256,
			memory_range:             10 * size::BYTES_IN_GIB,
			dram_memory_range:        0,
			dram_operation_ratio:     0.0,
			number_operations:        None,
			number_threads:           1,
			run_time:                 None,
			operation:                Operation::Read,
			exec_mode:                Mode::Sequential,
			persist_instruction:      PersistInstruction::NoCache,
			number_partitions:        0,
			numa_pattern:             NumaPattern::Near,
			random_distribution:      RandomDistribution::Uniform,
			zipf_alpha:               0.9,
			custom_operations:        vec![],
			latency_sample_frequency: 0,
			prefault_file:            true,
			dram_huge_pages:          true,
			min_io_chunk_size:        64 * size::BYTES_IN_MIB,
			pause_frequency:          0,
			pause_length_us:          0,
			matrix_args:              vec![],
		}
	}
}

impl BenchmarkConfig {
	/// Decodes a configuration from a document tree.
	///
	/// Unknown keys are rejected by name. Duplicate keys are rejected
	/// with their position by the document loader itself.
	pub fn decode(raw: &Mapping) -> Result<Self, ConfigError> {
		let mut config = Self::default();

		for (key, value) in raw {
			let key = key.as_str().ok_or_else(|| ConfigError::InvalidValue {
				key:    format!("{key:?}"),
				reason: "config keys must be strings".to_owned(),
			})?;

			match key {
				"memory_range" => config.memory_range = parse_size_entry(key, value)?,
				"dram_memory_range" => config.dram_memory_range = parse_size_entry(key, value)?,
				"access_size" => config.access_size = parse_size_entry(key, value)?,
				"min_io_chunk_size" => config.min_io_chunk_size = parse_size_entry(key, value)?,
				"number_operations" => config.number_operations = Some(parse_u64_entry(key, value)?),
				"run_time" => config.run_time = Some(parse_u64_entry(key, value)?),
				"number_partitions" => config.number_partitions = parse_u64_entry(key, value)?,
				"number_threads" => config.number_threads = parse_u64_entry(key, value)?,
				"latency_sample_frequency" => config.latency_sample_frequency = parse_u64_entry(key, value)?,
				"pause_frequency" => config.pause_frequency = parse_u64_entry(key, value)?,
				"pause_length_us" => config.pause_length_us = parse_u64_entry(key, value)?,
				"zipf_alpha" => config.zipf_alpha = parse_f64_entry(key, value)?,
				"dram_operation_ratio" => config.dram_operation_ratio = parse_f64_entry(key, value)?,
				"prefault_file" => config.prefault_file = parse_bool_entry(key, value)?,
				"dram_huge_pages" => config.dram_huge_pages = parse_bool_entry(key, value)?,
				"exec_mode" => config.exec_mode = parse_enum_entry(key, value, Mode::from_config_str)?,
				"operation" => config.operation = parse_enum_entry(key, value, Operation::from_config_str)?,
				"persist_instruction" =>
					config.persist_instruction = parse_enum_entry(key, value, PersistInstruction::from_config_str)?,
				"random_distribution" =>
					config.random_distribution = parse_enum_entry(key, value, RandomDistribution::from_config_str)?,
				"numa_pattern" => config.numa_pattern = parse_enum_entry(key, value, NumaPattern::from_config_str)?,
				"custom_operations" => {
					let chain = parse_str_entry(key, value)?;
					config.custom_operations = ops::parse_chain(chain)?;
				},
				key => return Err(ConfigError::UnknownKey { key: key.to_owned() }),
			}
		}

		Ok(config)
	}

	/// Validates this configuration against every invariant.
	///
	/// Checks run independently, so the error reports all violations
	/// present, not just the first.
	pub fn validate(&self, topology: &NumaTopology) -> Result<(), ConfigError> {
		let mut violations = vec![];

		if self.access_size < CACHE_LINE_SIZE {
			violations.push("Access size must be at least 64 B, i.e. one cache line".to_owned());
		}
		if !self.access_size.is_power_of_two() {
			violations.push("Access size must be a power of two".to_owned());
		}
		if self.memory_range == 0 {
			violations.push("PMem memory range must be non-zero".to_owned());
		}
		if self.access_size > 0 && self.memory_range % self.access_size != 0 {
			violations.push("PMem memory range must be a multiple of the access size".to_owned());
		}
		if self.access_size > 0 && self.dram_memory_range % self.access_size != 0 {
			violations.push("DRAM memory range must be a multiple of the access size or 0".to_owned());
		}
		if self.number_threads == 0 {
			violations.push("Number of threads must be at least 1".to_owned());
		}
		if self.number_partitions > 0 && self.number_threads % self.number_partitions != 0 {
			violations.push("Number of threads must be a multiple of the number of partitions".to_owned());
		}

		let partitions = self.effective_partitions();
		if partitions > 0 && self.access_size > 0 {
			if (self.memory_range / partitions) % self.access_size != 0 {
				violations
					.push("PMem memory range must divide evenly into partitions at access-size granularity".to_owned());
			}
			if self.dram_memory_range > 0 && (self.dram_memory_range / partitions) % self.access_size != 0 {
				violations
					.push("DRAM memory range must divide evenly into partitions at access-size granularity".to_owned());
			}
		}

		if self.min_io_chunk_size < CACHE_LINE_SIZE || !self.min_io_chunk_size.is_power_of_two() {
			violations.push("Minimum IO chunk size must be a power of two and at least 64 B".to_owned());
		}
		if self.min_io_chunk_size < self.access_size {
			violations.push("Minimum IO chunk size must be at least the access size".to_owned());
		}
		if self.exec_mode.is_sequential() && self.min_io_chunk_size > 0 && self.memory_range % self.min_io_chunk_size != 0
		{
			violations.push("PMem memory range must be a multiple of the IO chunk size for sequential access".to_owned());
		}
		if self.number_threads > 0 && self.memory_range / self.number_threads < self.min_io_chunk_size {
			violations.push(format!(
				"Each thread needs at least {} of memory",
				size::format_size(self.min_io_chunk_size)
			));
		}

		if self.number_operations.is_some() && !matches!(self.exec_mode, Mode::Random | Mode::Custom) {
			violations.push("Number of operations is only valid for random or custom access".to_owned());
		}
		if matches!(self.exec_mode, Mode::Random | Mode::Custom) && self.access_size > 0 {
			let min_operations = (self.min_io_chunk_size / self.access_size) * self.number_threads;
			if self.effective_number_operations() <= min_operations {
				violations.push(format!(
					"Number of operations must be over {min_operations} so every thread receives at least one chunk"
				));
			}
		}

		if !(0.0..=1.0).contains(&self.dram_operation_ratio) {
			violations.push("DRAM operation ratio must be between 0 and 1".to_owned());
		}
		if self.dram_operation_ratio > 0.0 && (self.exec_mode != Mode::Random || self.dram_memory_range == 0) {
			violations.push("DRAM operation ratio requires random access and a DRAM memory range".to_owned());
		}
		if self.dram_memory_range == 0 && self.custom_operations.iter().any(|op| op.tier == MemoryTier::Dram) {
			violations.push("DRAM operations require a DRAM memory range".to_owned());
		}

		match self.exec_mode {
			Mode::Custom if self.custom_operations.is_empty() =>
				violations.push("Custom operations must be specified for custom execution".to_owned()),
			Mode::Custom =>
				if let Err(err) = ops::validate_chain(&self.custom_operations) {
					violations.push(err.to_string());
				},
			_ if !self.custom_operations.is_empty() =>
				violations.push("Custom operations cannot be specified for non-custom execution".to_owned()),
			_ => (),
		}

		if partitions > 0 {
			for op in &self.custom_operations {
				let tier_range = match op.tier {
					MemoryTier::PMem => self.memory_range,
					MemoryTier::Dram => self.dram_memory_range,
				} / partitions;
				if op.size > tier_range {
					violations.push(format!(
						"Custom operation {op} exceeds its partition size of {}",
						size::format_size(tier_range)
					));
				}
			}
		}

		if self.latency_sample_frequency > 0 && self.exec_mode != Mode::Custom {
			violations.push("Latency sampling is only valid for custom execution".to_owned());
		}
		if matches!(self.run_time, Some(0)) {
			violations.push("Run time must be at least 1 second".to_owned());
		}
		if self.numa_pattern == NumaPattern::Far && !topology.has_far_nodes() {
			violations.push("Cannot run a far NUMA pattern without far NUMA nodes".to_owned());
		}
		if (self.pause_frequency == 0) != (self.pause_length_us == 0) {
			violations.push("Paused execution requires both a pause frequency and a pause length".to_owned());
		}

		match violations.is_empty() {
			true => Ok(()),
			false => Err(ConfigError::Invalid { violations }),
		}
	}

	/// Returns the effective number of partitions, resolving 0 to one
	/// partition per thread
	pub fn effective_partitions(&self) -> u64 {
		match self.number_partitions {
			0 => self.number_threads,
			partitions => partitions,
		}
	}

	/// Returns the effective number of operations for random / custom
	/// execution
	pub fn effective_number_operations(&self) -> u64 {
		self.number_operations.unwrap_or(DEFAULT_NUMBER_OPERATIONS)
	}

	/// Returns whether this workload performs any read
	pub fn contains_read_op(&self) -> bool {
		self.operation == Operation::Read || self.exec_mode == Mode::Custom
	}

	/// Returns whether this workload performs any write
	pub fn contains_write_op(&self) -> bool {
		self.operation == Operation::Write ||
			self.custom_operations.iter().any(|op| op.kind == Operation::Write)
	}

	/// Returns whether this workload accesses the DRAM tier
	pub fn contains_dram_op(&self) -> bool {
		self.dram_operation_ratio > 0.0 ||
			self.custom_operations.iter().any(|op| op.tier == MemoryTier::Dram)
	}
}

/// Serializes a custom operation chain as its compact string form
fn serialize_custom_ops<S: serde::Serializer>(ops: &[CustomOp], serializer: S) -> Result<S::Ok, S::Error> {
	serializer.serialize_str(&ops::serialize_chain(ops))
}

/// Parses a byte-sized entry, either an integer or a string with a
/// `k`/`m`/`g` suffix
fn parse_size_entry(key: &str, value: &serde_yaml::Value) -> Result<u64, ConfigError> {
	match value {
		serde_yaml::Value::Number(number) => number.as_u64().ok_or_else(|| ConfigError::InvalidValue {
			key:    key.to_owned(),
			reason: format!("expected a non-negative integer, got {number}"),
		}),
		serde_yaml::Value::String(s) => size::parse_size(s).map_err(|err| ConfigError::InvalidValue {
			key:    key.to_owned(),
			reason: err.to_string(),
		}),
		value => Err(ConfigError::InvalidValue {
			key:    key.to_owned(),
			reason: format!("expected a byte size, got {value:?}"),
		}),
	}
}

fn parse_u64_entry(key: &str, value: &serde_yaml::Value) -> Result<u64, ConfigError> {
	value.as_u64().ok_or_else(|| ConfigError::InvalidValue {
		key:    key.to_owned(),
		reason: format!("expected a non-negative integer, got {value:?}"),
	})
}

fn parse_f64_entry(key: &str, value: &serde_yaml::Value) -> Result<f64, ConfigError> {
	value.as_f64().ok_or_else(|| ConfigError::InvalidValue {
		key:    key.to_owned(),
		reason: format!("expected a number, got {value:?}"),
	})
}

fn parse_bool_entry(key: &str, value: &serde_yaml::Value) -> Result<bool, ConfigError> {
	value.as_bool().ok_or_else(|| ConfigError::InvalidValue {
		key:    key.to_owned(),
		reason: format!("expected a boolean, got {value:?}"),
	})
}

fn parse_str_entry<'v>(key: &str, value: &'v serde_yaml::Value) -> Result<&'v str, ConfigError> {
	value.as_str().ok_or_else(|| ConfigError::InvalidValue {
		key:    key.to_owned(),
		reason: format!("expected a string, got {value:?}"),
	})
}

fn parse_enum_entry<T>(
	key: &str,
	value: &serde_yaml::Value,
	from_str: impl FnOnce(&str) -> Option<T>,
) -> Result<T, ConfigError> {
	let s = parse_str_entry(key, value)?;
	from_str(s).ok_or_else(|| ConfigError::InvalidValue {
		key:    key.to_owned(),
		reason: format!("unknown variant {s:?}"),
	})
}

#[cfg(test)]
mod tests {
	use {super::*, pmembench_util::size::BYTES_IN_MIB};

	fn decode_str(yaml: &str) -> Result<BenchmarkConfig, ConfigError> {
		let raw = serde_yaml::from_str::<Mapping>(yaml).expect("Unable to parse test yaml");
		BenchmarkConfig::decode(&raw)
	}

	fn near_only() -> NumaTopology {
		NumaTopology::local()
	}

	#[test]
	fn default_config_validates() {
		let config = BenchmarkConfig::default();
		config.validate(&near_only()).expect("Default config must validate");
	}

	#[test]
	fn decode_size_suffixes() {
		let config = decode_str("memory_range: 1g\naccess_size: 512\nmin_io_chunk_size: 64m\n").unwrap();
		assert_eq!(config.memory_range, 1024 * BYTES_IN_MIB);
		assert_eq!(config.access_size, 512);
		assert_eq!(config.min_io_chunk_size, 64 * BYTES_IN_MIB);
	}

	#[test]
	fn decode_enums() {
		let config = decode_str(
			"exec_mode: random\noperation: write\npersist_instruction: cacheinv\nrandom_distribution: zipf\n\
			 numa_pattern: near\nnumber_operations: 10000000\n",
		)
		.unwrap();
		assert_eq!(config.exec_mode, Mode::Random);
		assert_eq!(config.operation, Operation::Write);
		assert_eq!(config.persist_instruction, PersistInstruction::CacheInvalidate);
		assert_eq!(config.random_distribution, RandomDistribution::Zipf);
		assert_eq!(config.numa_pattern, NumaPattern::Near);
		assert_eq!(config.number_operations, Some(10_000_000));
	}

	#[test]
	fn decode_sequential_asc_alias() {
		let config = decode_str("exec_mode: sequential_asc\n").unwrap();
		assert_eq!(config.exec_mode, Mode::Sequential);
	}

	#[test]
	fn decode_rejects_unknown_key() {
		let err = decode_str("access_size: 256\nfoo_bar: 3\n").unwrap_err();
		assert!(matches!(err, ConfigError::UnknownKey { key } if key == "foo_bar"));
	}

	#[test]
	fn decode_rejects_bad_value() {
		let err = decode_str("number_threads: yes\n").unwrap_err();
		assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "number_threads"));
	}

	#[test]
	fn validate_accepts_power_of_two_sizes() {
		for access_size in [64, 128, 256, 4096] {
			let config = BenchmarkConfig {
				access_size,
				memory_range: 256 * BYTES_IN_MIB,
				..BenchmarkConfig::default()
			};
			config.validate(&near_only()).expect("Config must validate");
		}
	}

	#[test]
	fn validate_rejects_small_access_size() {
		let config = BenchmarkConfig {
			access_size: 32,
			..BenchmarkConfig::default()
		};
		assert!(config.validate(&near_only()).is_err());
	}

	#[test]
	fn validate_rejects_non_power_of_two_access_size() {
		let config = BenchmarkConfig {
			access_size: 100,
			..BenchmarkConfig::default()
		};
		assert!(config.validate(&near_only()).is_err());
	}

	#[test]
	fn validate_rejects_zero_threads() {
		let config = BenchmarkConfig {
			number_threads: 0,
			..BenchmarkConfig::default()
		};
		assert!(config.validate(&near_only()).is_err());
	}

	#[test]
	fn validate_rejects_threads_not_multiple_of_partitions() {
		let config = BenchmarkConfig {
			number_threads: 4,
			number_partitions: 3,
			..BenchmarkConfig::default()
		};
		assert!(config.validate(&near_only()).is_err());
	}

	#[test]
	fn validate_rejects_number_operations_for_sequential() {
		let config = BenchmarkConfig {
			number_operations: Some(1_000_000),
			..BenchmarkConfig::default()
		};
		assert!(config.validate(&near_only()).is_err());
	}

	#[test]
	fn validate_rejects_too_few_operations() {
		// 4 threads, 1 MiB chunks of 256 B accesses: needs over 16384 ops
		let config = BenchmarkConfig {
			exec_mode: Mode::Random,
			number_threads: 4,
			min_io_chunk_size: BYTES_IN_MIB,
			number_operations: Some(1024),
			..BenchmarkConfig::default()
		};
		assert!(config.validate(&near_only()).is_err());
	}

	#[test]
	fn validate_rejects_chunk_smaller_than_access_size() {
		// Both sizes are valid powers of two on their own, but a chunk
		// below one access would hold zero operations
		let config = BenchmarkConfig {
			access_size: 256,
			min_io_chunk_size: 64,
			..BenchmarkConfig::default()
		};
		assert!(config.validate(&near_only()).is_err());

		let config = BenchmarkConfig {
			access_size: 256,
			min_io_chunk_size: 256,
			memory_range: 256 * BYTES_IN_MIB,
			..BenchmarkConfig::default()
		};
		config.validate(&near_only()).expect("Chunk matching the access size must validate");
	}

	#[test]
	fn validate_rejects_custom_op_exceeding_partition() {
		let base = BenchmarkConfig {
			exec_mode: Mode::Custom,
			memory_range: 4 * BYTES_IN_MIB,
			min_io_chunk_size: BYTES_IN_MIB,
			number_operations: Some(10_000_000),
			..BenchmarkConfig::default()
		};

		// An 8 MiB read cannot fit a 4 MiB partition
		let config = BenchmarkConfig {
			custom_operations: ops::parse_chain("rp_8388608").unwrap(),
			..base.clone()
		};
		assert!(config.validate(&near_only()).is_err());

		// Same for a DRAM-tier op against a smaller DRAM partition
		let config = BenchmarkConfig {
			custom_operations: ops::parse_chain("rp_256,rd_4096").unwrap(),
			dram_memory_range: 2048,
			..base.clone()
		};
		assert!(config.validate(&near_only()).is_err());

		let config = BenchmarkConfig {
			custom_operations: ops::parse_chain("rp_4096").unwrap(),
			..base
		};
		config.validate(&near_only()).expect("Fitting op must validate");
	}

	#[test]
	fn validate_rejects_dram_ratio_without_dram_range() {
		let config = BenchmarkConfig {
			exec_mode: Mode::Random,
			dram_operation_ratio: 0.5,
			..BenchmarkConfig::default()
		};
		assert!(config.validate(&near_only()).is_err());
	}

	#[test]
	fn validate_rejects_far_numa_without_far_nodes() {
		let config = BenchmarkConfig {
			numa_pattern: NumaPattern::Far,
			..BenchmarkConfig::default()
		};
		assert!(config.validate(&near_only()).is_err());

		let far_capable = NumaTopology::new(vec![0], vec![1]);
		config.validate(&far_capable).expect("Config must validate with far nodes");
	}

	#[test]
	fn validate_rejects_custom_ops_for_non_custom_mode() {
		let config = BenchmarkConfig {
			custom_operations: ops::parse_chain("rp_64").unwrap(),
			..BenchmarkConfig::default()
		};
		assert!(config.validate(&near_only()).is_err());
	}

	#[test]
	fn validate_requires_custom_ops_for_custom_mode() {
		let config = BenchmarkConfig {
			exec_mode: Mode::Custom,
			number_operations: Some(10_000_000),
			..BenchmarkConfig::default()
		};
		assert!(config.validate(&near_only()).is_err());
	}

	#[test]
	fn validate_collects_all_violations() {
		let config = BenchmarkConfig {
			access_size: 100,
			number_threads: 0,
			..BenchmarkConfig::default()
		};
		let err = config.validate(&near_only()).unwrap_err();
		match err {
			ConfigError::Invalid { violations } => assert!(violations.len() >= 3),
			err => panic!("Expected an invalid config error, got {err:?}"),
		}
	}
}
