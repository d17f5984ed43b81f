//! Result aggregation
//!
//! Turns raw per-thread chunk timings into the bandwidth and latency
//! figures emitted per run.

// Imports
use {
	average::Variance,
	itertools::{Itertools, MinMaxResult},
	pmembench_util::size::BYTES_IN_GIB,
};

/// Nanoseconds in a second
const NANOSECONDS_IN_SECOND: f64 = 1_000_000_000.0;

/// Timing record of one completed chunk
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkRecord {
	/// Chunk start, nanoseconds from the run origin
	pub start_ns: u64,

	/// Chunk end, nanoseconds from the run origin
	pub end_ns: u64,

	/// Bytes accessed during the chunk
	pub bytes: u64,
}

/// Everything one worker thread measured
#[derive(Clone, Debug, Default)]
pub struct ThreadMeasurement {
	/// Completed chunk timings
	pub chunks: Vec<ChunkRecord>,

	/// Sampled per-operation latencies, custom mode only
	pub latencies_ns: Vec<u64>,
}

impl ThreadMeasurement {
	/// Total bytes accessed by this thread
	pub fn total_bytes(&self) -> u64 {
		self.chunks.iter().map(|chunk| chunk.bytes).sum()
	}

	/// This thread's bandwidth in GiB/s, `None` when nothing was timed
	pub fn bandwidth(&self) -> Option<f64> {
		let (start_ns, end_ns) = self.span_ns()?;
		Some(bandwidth_gib_per_sec(self.total_bytes(), end_ns - start_ns))
	}

	/// First chunk start and last chunk end of this thread
	fn span_ns(&self) -> Option<(u64, u64)> {
		let start_ns = self.chunks.iter().map(|chunk| chunk.start_ns).min()?;
		let end_ns = self.chunks.iter().map(|chunk| chunk.end_ns).max()?;
		Some((start_ns, end_ns))
	}
}

/// Aggregated bandwidth of one run
#[derive(Clone, Copy, Debug, PartialEq)]
#[derive(serde::Serialize)]
pub struct Bandwidth {
	/// Whole-run bandwidth over the wall-clock span, GiB/s
	pub total: f64,

	/// Average of the per-thread bandwidths, GiB/s
	pub per_thread_avg: f64,

	/// Population standard deviation of the per-thread bandwidths, GiB/s
	pub per_thread_std_dev: f64,
}

/// Aggregated operation latency of one run, custom mode only
#[derive(Clone, Copy, Debug, PartialEq)]
#[derive(serde::Serialize)]
pub struct Latency {
	/// Average sampled latency, ns
	pub avg_ns: f64,

	/// Smallest sampled latency, ns
	pub min_ns: u64,

	/// Largest sampled latency, ns
	pub max_ns: u64,

	/// Population standard deviation of the sampled latencies, ns
	pub std_dev_ns: f64,
}

/// One run's aggregated results
#[derive(Clone, Debug, PartialEq)]
#[derive(serde::Serialize)]
pub struct RunResult {
	/// Bandwidth figures
	pub bandwidth: Bandwidth,

	/// Latency figures, present only when latencies were sampled
	#[serde(skip_serializing_if = "Option::is_none")]
	pub latency: Option<Latency>,
}

/// Converts `bytes` accessed over `duration_ns` into GiB/s.
///
/// The division by time happens before the unit conversion so byte and
/// nanosecond counts that divide exactly stay exact.
pub fn bandwidth_gib_per_sec(bytes: u64, duration_ns: u64) -> f64 {
	let bytes_per_sec = bytes as f64 * NANOSECONDS_IN_SECOND / duration_ns as f64;
	bytes_per_sec / BYTES_IN_GIB as f64
}

/// Aggregates all thread measurements of one run
pub fn aggregate(measurements: &[ThreadMeasurement]) -> RunResult {
	let per_thread: Variance = measurements
		.iter()
		.filter_map(ThreadMeasurement::bandwidth)
		.collect();

	// The whole-run figure spans from the earliest chunk start to the
	// latest chunk end across all threads
	let span = measurements
		.iter()
		.flat_map(|measurement| &measurement.chunks)
		.flat_map(|chunk| [chunk.start_ns, chunk.end_ns])
		.minmax();
	let total = match span {
		MinMaxResult::MinMax(start_ns, end_ns) => {
			let total_bytes = measurements.iter().map(ThreadMeasurement::total_bytes).sum();
			bandwidth_gib_per_sec(total_bytes, end_ns - start_ns)
		},
		MinMaxResult::OneElement(_) | MinMaxResult::NoElements => 0.0,
	};

	let bandwidth = Bandwidth {
		total,
		per_thread_avg: per_thread.mean(),
		per_thread_std_dev: per_thread.population_variance().sqrt(),
	};

	RunResult {
		bandwidth,
		latency: aggregate_latencies(measurements),
	}
}

/// Aggregates the sampled latencies, if any
fn aggregate_latencies(measurements: &[ThreadMeasurement]) -> Option<Latency> {
	let samples = measurements
		.iter()
		.flat_map(|measurement| &measurement.latencies_ns)
		.copied()
		.collect::<Vec<_>>();
	let (&min_ns, &max_ns) = samples.iter().minmax().into_option()?;

	let stats: Variance = samples.iter().map(|&sample| sample as f64).collect();
	Some(Latency {
		avg_ns: stats.mean(),
		min_ns,
		max_ns,
		std_dev_ns: stats.population_variance().sqrt(),
	})
}

#[cfg(test)]
mod tests {
	use {
		super::*,
		pmembench_util::size::BYTES_IN_MIB,
	};

	fn thread(chunks: Vec<ChunkRecord>) -> ThreadMeasurement {
		ThreadMeasurement {
			chunks,
			latencies_ns: vec![],
		}
	}

	#[test]
	fn single_thread_bandwidth_is_exact() {
		// 1 MiB in 1 ms is exactly 0.9765625 GiB/s
		let measurement = thread(vec![ChunkRecord {
			start_ns: 0,
			end_ns:   1_000_000,
			bytes:    BYTES_IN_MIB,
		}]);

		assert_eq!(measurement.bandwidth(), Some(0.9765625));

		let result = aggregate(&[measurement]);
		assert_eq!(result.bandwidth.total, 0.9765625);
		assert_eq!(result.bandwidth.per_thread_avg, 0.9765625);
		assert_eq!(result.bandwidth.per_thread_std_dev, 0.0);
		assert_eq!(result.latency, None);
	}

	#[test]
	fn total_spans_wall_clock() {
		// Two threads, each moving 1 MiB in 1 ms, but offset by 1 ms:
		// the run spans 2 ms, so the total equals one thread's rate
		// while the per-thread average is that same rate
		let measurements = [
			thread(vec![ChunkRecord {
				start_ns: 0,
				end_ns:   1_000_000,
				bytes:    BYTES_IN_MIB,
			}]),
			thread(vec![ChunkRecord {
				start_ns: 1_000_000,
				end_ns:   2_000_000,
				bytes:    BYTES_IN_MIB,
			}]),
		];

		let result = aggregate(&measurements);
		assert_eq!(result.bandwidth.total, 0.9765625);
		assert_eq!(result.bandwidth.per_thread_avg, 0.9765625);
		assert_eq!(result.bandwidth.per_thread_std_dev, 0.0);
	}

	#[test]
	fn per_thread_std_dev_is_population() {
		// Rates of 1 and 3 units: population std-dev is 1, not sqrt(2)
		let measurements = [
			thread(vec![ChunkRecord {
				start_ns: 0,
				end_ns:   1_000_000,
				bytes:    BYTES_IN_MIB,
			}]),
			thread(vec![ChunkRecord {
				start_ns: 0,
				end_ns:   1_000_000,
				bytes:    3 * BYTES_IN_MIB,
			}]),
		];

		let result = aggregate(&measurements);
		assert_eq!(result.bandwidth.per_thread_avg, 2.0 * 0.9765625);
		assert!((result.bandwidth.per_thread_std_dev - 0.9765625).abs() < 1e-12);
	}

	#[test]
	fn latency_aggregation() {
		let mut measurement = thread(vec![ChunkRecord {
			start_ns: 0,
			end_ns:   1_000_000,
			bytes:    BYTES_IN_MIB,
		}]);
		measurement.latencies_ns = vec![100, 200, 300];

		let latency = aggregate(&[measurement]).latency.unwrap();
		assert_eq!(latency.min_ns, 100);
		assert_eq!(latency.max_ns, 300);
		assert_eq!(latency.avg_ns, 200.0);
		assert!((latency.std_dev_ns - (200.0f64 / 3.0).sqrt() * 10.0).abs() < 1e-9);
	}

	#[test]
	fn empty_measurements() {
		let result = aggregate(&[]);
		assert_eq!(result.bandwidth.total, 0.0);
		assert_eq!(result.latency, None);
	}
}
