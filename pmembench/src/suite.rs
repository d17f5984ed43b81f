//! Benchmark suite
//!
//! Drives every benchmark of a definition document in declaration
//! order. A definition that fails configuration is skipped with a
//! logged error; a resource or runtime failure aborts the suite, with
//! the results of already-completed workloads preserved so the caller
//! can still flush them.

// Imports
use {
	crate::{
		benchmark::{Benchmark, BenchmarkError, BenchmarkRun, WorkloadRun},
		exec::ExecutionContext,
		matrix,
		numa::NumaTopology,
	},
	serde_yaml::Value,
	std::{
		collections::BTreeMap,
		path::PathBuf,
	},
};

/// Suite error: the failing benchmark plus everything finished before it
#[derive(Debug)]
#[derive(thiserror::Error)]
#[error("Benchmark {name:?} failed")]
pub struct SuiteError {
	/// Name of the failing benchmark
	pub name: String,

	/// Results of the workloads completed before the failure
	pub completed: Vec<GroupResult>,

	/// Underlying failure
	#[source]
	pub source: BenchmarkError,
}

/// One benchmark run's report
#[derive(Clone, Debug)]
#[derive(serde::Serialize)]
#[serde(untagged)]
pub enum RunReport {
	/// Single workload
	Single(WorkloadRun),

	/// Parallel workloads, keyed by sub-workload name
	Parallel(BTreeMap<String, WorkloadRun>),
}

/// All runs of one benchmark definition
#[derive(Clone, Debug)]
#[derive(serde::Serialize)]
pub struct GroupResult {
	/// Definition name
	pub bm_name: String,

	/// Definition type, `single` or `parallel`
	pub bm_type: String,

	/// Field names varied by the definition's matrix
	pub matrix_args: Vec<String>,

	/// One entry per matrix combination, in expansion order
	pub benchmarks: Vec<RunReport>,
}

/// Benchmark suite
#[derive(Clone, Debug)]
pub struct BenchmarkSuite {
	/// Topology all runs execute against
	topology: NumaTopology,

	/// Base seed for every run's random streams
	run_seed: u64,

	/// Directory for persistent backing files, anonymous memory when absent
	pmem_dir: Option<PathBuf>,
}

impl BenchmarkSuite {
	/// Creates a suite
	pub fn new(topology: NumaTopology, run_seed: u64, pmem_dir: Option<PathBuf>) -> Self {
		Self {
			topology,
			run_seed,
			pmem_dir,
		}
	}

	/// Runs every benchmark in `doc`, returning the grouped results
	pub fn run(&self, doc: &Value) -> Result<Vec<GroupResult>, SuiteError> {
		let definitions = match doc.as_mapping() {
			Some(definitions) => definitions,
			None => {
				tracing::error!("Benchmark document must be a mapping of benchmark name to definition");
				return Ok(vec![]);
			},
		};

		let mut results = vec![];
		for (name, definition) in definitions {
			let Some(name) = name.as_str() else {
				tracing::error!(?name, "Skipping benchmark with a non-string name");
				continue;
			};

			// Configuration failures only cost this definition
			let benchmarks = match matrix::create_definition(name, definition, &self.topology) {
				Ok(benchmarks) => benchmarks,
				Err(err) => {
					tracing::error!(name, %err, "Skipping invalid benchmark definition");
					continue;
				},
			};
			let Some(first) = benchmarks.first() else {
				continue;
			};

			let mut group = GroupResult {
				bm_name: name.to_owned(),
				bm_type: first.kind().to_owned(),
				matrix_args: first.matrix_args().to_vec(),
				benchmarks: vec![],
			};
			for benchmark in &benchmarks {
				let context = ExecutionContext::new(self.run_seed, self.topology.clone());
				match benchmark.run(&context, self.pmem_dir.as_deref()) {
					Ok(run) => group.benchmarks.push(Self::report(benchmark, run)),
					Err(source) => {
						// Preserve what this definition already finished
						results.push(group);
						return Err(SuiteError {
							name: name.to_owned(),
							completed: results,
							source,
						});
					},
				}
			}

			results.push(group);
		}

		Ok(results)
	}

	/// Shapes one completed run into its report
	fn report(benchmark: &Benchmark, run: BenchmarkRun) -> RunReport {
		match (benchmark, run) {
			(_, BenchmarkRun::Single(workload)) => RunReport::Single(workload),
			(Benchmark::Parallel { sub_names, .. }, BenchmarkRun::Parallel(workloads)) => {
				let [first, second] = workloads;
				RunReport::Parallel(BTreeMap::from([
					(sub_names[0].clone(), first),
					(sub_names[1].clone(), second),
				]))
			},
			(Benchmark::Single { .. }, BenchmarkRun::Parallel(_)) =>
				unreachable!("Single benchmarks produce single runs"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn doc(yaml: &str) -> Value {
		serde_yaml::from_str(yaml).unwrap()
	}

	fn suite() -> BenchmarkSuite {
		BenchmarkSuite::new(NumaTopology::local(), 42, None)
	}

	const SMALL_ARGS: &str = "
  args:
    memory_range: 4m
    min_io_chunk_size: 1m
    number_threads: 1
";

	#[test]
	fn runs_definitions_in_order() {
		let doc = doc(&format!("first:{SMALL_ARGS}second:{SMALL_ARGS}"));
		let results = suite().run(&doc).unwrap();

		assert_eq!(results.len(), 2);
		assert_eq!(results[0].bm_name, "first");
		assert_eq!(results[1].bm_name, "second");
		assert_eq!(results[0].bm_type, "single");
		assert_eq!(results[0].benchmarks.len(), 1);
	}

	#[test]
	fn invalid_definition_is_skipped() {
		// The first definition's access size is invalid, the second runs
		let doc = doc(&format!(
			"broken:\n  args:\n    access_size: 100\nworking:{SMALL_ARGS}"
		));
		let results = suite().run(&doc).unwrap();

		assert_eq!(results.len(), 1);
		assert_eq!(results[0].bm_name, "working");
	}

	#[test]
	fn matrix_group_collects_all_combinations() {
		let doc = doc(&format!(
			"matrixed:{SMALL_ARGS}  matrix:\n    access_size: [256, 1024]\n"
		));
		let results = suite().run(&doc).unwrap();

		assert_eq!(results.len(), 1);
		assert_eq!(results[0].matrix_args, ["access_size"]);
		assert_eq!(results[0].benchmarks.len(), 2);
	}

	#[test]
	fn non_mapping_document_yields_no_results() {
		let doc = doc("[1, 2, 3]");
		assert!(suite().run(&doc).unwrap().is_empty());
	}
}
