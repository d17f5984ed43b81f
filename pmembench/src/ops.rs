//! Custom operation chains
//!
//! A chain is a non-empty ordered sequence of typed read/write steps
//! defining a non-uniform access pattern. Its compact string form is a
//! comma-separated list of operations:
//!
//! - Reads: `<op-tier>_<size>` with `op-tier` one of `r`/`rp` (PMem) or
//!   `rd` (DRAM), e.g. `rp_64`.
//! - Writes: `<op-tier>_<size>_<persist>[_<offset>]` with `op-tier` one
//!   of `w`/`wp` (PMem) or `wd` (DRAM), e.g. `wp_128_nocache_-64`. The
//!   offset is relative to the previously accessed address and must be a
//!   multiple of the cache line size.

// Imports
use {
	crate::config::{Operation, PersistInstruction, CACHE_LINE_SIZE},
	std::{fmt, str::FromStr},
};

/// Memory tier accessed by an operation
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[derive(serde::Serialize)]
pub enum MemoryTier {
	/// Persistent memory
	#[serde(rename = "pmem")]
	PMem,

	/// Volatile memory
	#[serde(rename = "dram")]
	Dram,
}

/// A single user-specified operation within a chain
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[derive(serde::Serialize)]
pub struct CustomOp {
	/// Read or write
	pub kind: Operation,

	/// Memory tier the operation targets
	pub tier: MemoryTier,

	/// Access size in bytes, a power of two of at least one cache line
	pub size: u64,

	/// Persist instruction, writes only
	pub persist: PersistInstruction,

	/// Offset to the previously accessed address, writes only.
	///
	/// Can be negative, e.g. to write to the previous cache line.
	pub offset: i64,
}

impl CustomOp {
	/// Creates a read operation
	pub fn read(tier: MemoryTier, size: u64) -> Self {
		Self {
			kind: Operation::Read,
			tier,
			size,
			persist: PersistInstruction::None,
			offset: 0,
		}
	}

	/// Creates a write operation
	pub fn write(tier: MemoryTier, size: u64, persist: PersistInstruction, offset: i64) -> Self {
		Self {
			kind: Operation::Write,
			tier,
			size,
			persist,
			offset,
		}
	}
}

/// Chain error
#[derive(Clone, Debug, PartialEq, Eq)]
#[derive(thiserror::Error)]
pub enum ChainError {
	/// Malformed operation string
	#[error("Unable to parse custom operation {op:?}: {reason}")]
	Parse { op: String, reason: String },

	/// Structurally parseable but semantically invalid chain
	#[error("Invalid operation {op} at position {index}: {reason}")]
	Validity {
		index:  usize,
		op:     String,
		reason: &'static str,
	},

	/// Empty chain
	#[error("Custom operation chain must not be empty")]
	Empty,
}

impl ChainError {
	/// Creates a parse error for `op`
	fn parse(op: &str, reason: impl Into<String>) -> Self {
		Self::Parse {
			op:     op.to_owned(),
			reason: reason.into(),
		}
	}
}

impl FromStr for CustomOp {
	type Err = ChainError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let mut parts = s.split('_');
		let head = parts.next().ok_or_else(|| ChainError::parse(s, "empty operation"))?;

		// Operation kind and tier, with PMem as the default tier
		let (kind, tier) = match head {
			"r" | "rp" => (Operation::Read, MemoryTier::PMem),
			"rd" => (Operation::Read, MemoryTier::Dram),
			"w" | "wp" => (Operation::Write, MemoryTier::PMem),
			"wd" => (Operation::Write, MemoryTier::Dram),
			head => return Err(ChainError::parse(s, format!("unknown operation kind {head:?}"))),
		};

		let size = parts
			.next()
			.ok_or_else(|| ChainError::parse(s, "missing access size"))?;
		let size = size
			.parse::<u64>()
			.map_err(|_| ChainError::parse(s, format!("invalid access size {size:?}")))?;
		if size < CACHE_LINE_SIZE || !size.is_power_of_two() {
			return Err(ChainError::parse(
				s,
				"access size must be a power of two of at least 64 B",
			));
		}

		let op = match kind {
			Operation::Read => {
				if parts.next().is_some() {
					return Err(ChainError::parse(s, "trailing tokens after read size"));
				}
				Self::read(tier, size)
			},
			Operation::Write => {
				let persist = parts
					.next()
					.ok_or_else(|| ChainError::parse(s, "missing persist instruction"))?;
				let persist = PersistInstruction::from_config_str(persist)
					.ok_or_else(|| ChainError::parse(s, format!("unknown persist instruction {persist:?}")))?;

				let offset = match parts.next() {
					Some(offset) => {
						let offset = offset
							.parse::<i64>()
							.map_err(|_| ChainError::parse(s, format!("invalid offset {offset:?}")))?;
						if offset % CACHE_LINE_SIZE as i64 != 0 {
							return Err(ChainError::parse(s, "offset must be a multiple of 64 B"));
						}
						offset
					},
					None => 0,
				};
				if parts.next().is_some() {
					return Err(ChainError::parse(s, "trailing tokens after write offset"));
				}

				Self::write(tier, size, persist, offset)
			},
		};

		Ok(op)
	}
}

impl fmt::Display for CustomOp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let tier = match self.tier {
			MemoryTier::PMem => 'p',
			MemoryTier::Dram => 'd',
		};
		match self.kind {
			Operation::Read => write!(f, "r{tier}_{}", self.size),
			Operation::Write => {
				let persist = match self.persist {
					PersistInstruction::NoCache => "nocache",
					PersistInstruction::Cache => "cache",
					PersistInstruction::CacheInvalidate => "cacheinv",
					PersistInstruction::None => "none",
				};
				write!(f, "w{tier}_{}_{persist}", self.size)?;
				if self.offset != 0 {
					write!(f, "_{}", self.offset)?;
				}
				Ok(())
			},
		}
	}
}

/// Parses a comma-separated operation chain
pub fn parse_chain(s: &str) -> Result<Vec<CustomOp>, ChainError> {
	if s.trim().is_empty() {
		return Err(ChainError::Empty);
	}
	s.split(',').map(|op| op.trim().parse()).collect()
}

/// Serializes a chain to its compact string form.
///
/// Exact inverse of [`parse_chain`] for any chain it produces.
pub fn serialize_chain(ops: &[CustomOp]) -> String {
	ops.iter().map(CustomOp::to_string).collect::<Vec<_>>().join(",")
}

/// Validates a chain.
///
/// The first operation must be a read, and every write must target the
/// current tier, i.e. the tier of the most recent operation before it.
pub fn validate_chain(ops: &[CustomOp]) -> Result<(), ChainError> {
	let first = ops.first().ok_or(ChainError::Empty)?;
	if first.kind != Operation::Read {
		return Err(ChainError::Validity {
			index:  0,
			op:     first.to_string(),
			reason: "a chain must start with a read",
		});
	}

	let mut current_tier = first.tier;
	for (index, op) in ops.iter().enumerate() {
		if op.kind == Operation::Write && op.tier != current_tier {
			return Err(ChainError::Validity {
				index,
				op: op.to_string(),
				reason: "a write must follow an operation on the same tier",
			});
		}
		current_tier = op.tier;
	}

	Ok(())
}
