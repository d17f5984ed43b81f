//! Persistent memory benchmark harness (`pmembench`)
//!
//! Measures read/write throughput of byte-addressable persistent memory
//! (and DRAM, for comparison) under configurable access patterns.

// Modules
pub mod access;
pub mod benchmark;
pub mod config;
pub mod exec;
pub mod matrix;
pub mod memory;
pub mod numa;
pub mod ops;
pub mod partition;
pub mod result;
pub mod suite;

// Exports
pub use self::{
	access::{AccessPrimitive, MemoryAccess},
	benchmark::Benchmark,
	config::{BenchmarkConfig, ConfigError},
	exec::ExecutionContext,
	numa::NumaTopology,
	suite::BenchmarkSuite,
};
