//! Benchmark matrix factory
//!
//! Expands a benchmark definition document into fully-resolved
//! [`Benchmark`]s. A definition carries base `args` plus an optional
//! `matrix` of candidate value lists; the factory takes the cartesian
//! product of the lists, overlays each combination onto the base
//! arguments and validates the result.

// Imports
use {
	crate::{
		benchmark::Benchmark,
		config::{BenchmarkConfig, ConfigError},
		numa::NumaTopology,
	},
	serde_yaml::{Mapping, Value},
};

/// Definition key holding the base arguments
const ARGS_KEY: &str = "args";

/// Definition key holding the matrix of candidate values
const MATRIX_KEY: &str = "matrix";

/// Definition key marking a parallel benchmark
const PARALLEL_KEY: &str = "parallel_benchmark";

/// Computes the cartesian product of the candidate lists.
///
/// The first declared field varies slowest, so combinations come out in
/// the order a nested loop over the declaration would produce.
pub fn cartesian_product(fields: &[(String, Vec<Value>)]) -> Vec<Vec<(String, Value)>> {
	let mut combinations = vec![vec![]];
	for (name, candidates) in fields {
		combinations = combinations
			.into_iter()
			.flat_map(|combination| {
				candidates.iter().map(move |candidate| {
					let mut combination = combination.clone();
					combination.push((name.clone(), candidate.clone()));
					combination
				})
			})
			.collect();
	}

	combinations
}

/// Expands `args` by `matrix` into one validated configuration per
/// combination. Without a matrix, the base arguments alone are decoded.
pub fn expand_matrix(
	args: &Mapping,
	matrix: Option<&Value>,
	topology: &NumaTopology,
) -> Result<Vec<BenchmarkConfig>, ConfigError> {
	let Some(matrix) = matrix else {
		let mut config = BenchmarkConfig::decode(args)?;
		config.validate(topology)?;
		return Ok(vec![config]);
	};

	let matrix = matrix.as_mapping().ok_or_else(|| ConfigError::Definition {
		reason: "`matrix` must be a mapping of field name to value list".to_owned(),
	})?;

	// Reject malformed candidate lists before any expansion work
	let fields = matrix
		.iter()
		.map(|(name, candidates)| {
			let name = value_to_key(name)?;
			let candidates = candidates
				.as_sequence()
				.filter(|candidates| !candidates.is_empty())
				.ok_or_else(|| ConfigError::Definition {
					reason: format!("Matrix entry {name:?} must be a non-empty list of candidate values"),
				})?;
			Ok((name, candidates.clone()))
		})
		.collect::<Result<Vec<_>, ConfigError>>()?;
	let matrix_args = fields.iter().map(|(name, _)| name.clone()).collect::<Vec<_>>();

	cartesian_product(&fields)
		.into_iter()
		.map(|combination| {
			let mut combined = args.clone();
			for (name, value) in combination {
				combined.insert(Value::String(name), value);
			}

			let mut config = BenchmarkConfig::decode(&combined)?;
			config.matrix_args = matrix_args.clone();
			config.validate(topology)?;
			Ok(config)
		})
		.collect()
}

/// Parses a whole benchmark definition document into benchmarks, in
/// declaration order
pub fn create_benchmarks(doc: &Value, topology: &NumaTopology) -> Result<Vec<Benchmark>, ConfigError> {
	let doc = doc.as_mapping().ok_or_else(|| ConfigError::Definition {
		reason: "Benchmark document must be a mapping of benchmark name to definition".to_owned(),
	})?;

	let mut benchmarks = vec![];
	for (name, definition) in doc {
		let name = value_to_key(name)?;
		benchmarks.extend(create_definition(&name, definition, topology)?);
	}

	Ok(benchmarks)
}

/// Parses a single benchmark definition into its resolved benchmarks
pub fn create_definition(
	name: &str,
	definition: &Value,
	topology: &NumaTopology,
) -> Result<Vec<Benchmark>, ConfigError> {
	let definition = definition.as_mapping().ok_or_else(|| ConfigError::Definition {
		reason: format!("Benchmark {name:?} must be a mapping"),
	})?;

	match definition.get(PARALLEL_KEY) {
		Some(parallel) => create_parallel(name, definition, parallel, topology),
		None => {
			let (args, matrix) = split_definition(name, definition)?;
			let benchmarks = expand_matrix(&args, matrix, topology)?
				.into_iter()
				.map(|config| Benchmark::Single {
					name: name.to_owned(),
					config,
				})
				.collect();
			Ok(benchmarks)
		},
	}
}

/// Parses a parallel definition: exactly two named sub-workloads, each
/// expanded independently and then crossed
fn create_parallel(
	name: &str,
	definition: &Mapping,
	parallel: &Value,
	topology: &NumaTopology,
) -> Result<Vec<Benchmark>, ConfigError> {
	if definition.len() != 1 {
		return Err(ConfigError::Definition {
			reason: format!("Parallel benchmark {name:?} must contain only the `{PARALLEL_KEY}` block"),
		});
	}

	let parallel = parallel.as_mapping().ok_or_else(|| ConfigError::Definition {
		reason: format!("Parallel benchmark {name:?} must map sub-workload names to definitions"),
	})?;
	if parallel.len() != 2 {
		return Err(ConfigError::Definition {
			reason: format!(
				"Parallel benchmark {name:?} must contain exactly two sub-workloads, found {}",
				parallel.len()
			),
		});
	}

	let sides = parallel
		.iter()
		.map(|(sub_name, sub_definition)| {
			let sub_name = value_to_key(sub_name)?;
			let sub_definition = sub_definition.as_mapping().ok_or_else(|| ConfigError::Definition {
				reason: format!("Sub-workload {sub_name:?} of {name:?} must be a mapping"),
			})?;
			let (args, matrix) = split_definition(&sub_name, sub_definition)?;
			Ok((sub_name, expand_matrix(&args, matrix, topology)?))
		})
		.collect::<Result<Vec<_>, ConfigError>>()?;
	let [(first_name, first_configs), (second_name, second_configs)] = <[_; 2]>::try_from(sides)
		.unwrap_or_else(|_| unreachable!("Parallel definition was checked to have two sub-workloads"));

	let benchmarks = first_configs
		.iter()
		.flat_map(|first| {
			second_configs.iter().map(|second| Benchmark::Parallel {
				name: name.to_owned(),
				sub_names: [first_name.clone(), second_name.clone()],
				configs: Box::new((first.clone(), second.clone())),
			})
		})
		.collect();
	Ok(benchmarks)
}

/// Splits a `{ args, matrix? }` definition, rejecting unknown keys
fn split_definition<'def>(
	name: &str,
	definition: &'def Mapping,
) -> Result<(Mapping, Option<&'def Value>), ConfigError> {
	for key in definition.keys() {
		let key = value_to_key(key)?;
		if key != ARGS_KEY && key != MATRIX_KEY {
			return Err(ConfigError::Definition {
				reason: format!("Unknown key {key:?} in benchmark definition {name:?}"),
			});
		}
	}

	let args = match definition.get(ARGS_KEY) {
		Some(args) => args
			.as_mapping()
			.ok_or_else(|| ConfigError::Definition {
				reason: format!("`{ARGS_KEY}` of benchmark {name:?} must be a mapping"),
			})?
			.clone(),
		None => Mapping::new(),
	};

	Ok((args, definition.get(MATRIX_KEY)))
}

/// Extracts a string key from a YAML mapping key
fn value_to_key(value: &Value) -> Result<String, ConfigError> {
	value
		.as_str()
		.map(str::to_owned)
		.ok_or_else(|| ConfigError::Definition {
			reason: format!("Expected a string key, found {value:?}"),
		})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn doc(yaml: &str) -> Value {
		serde_yaml::from_str(yaml).unwrap()
	}

	const BASE_ARGS: &str = r"
  args:
    memory_range: 64m
    min_io_chunk_size: 1m
    number_threads: 2
";

	#[test]
	fn matrix_expansion_is_a_cartesian_product() {
		let doc = doc(&format!(
			"bm:\n{BASE_ARGS}  matrix:\n    access_size: [256, 1024, 4096]\n    operation: [read, write]\n"
		));
		let benchmarks = create_benchmarks(&doc, &NumaTopology::local()).unwrap();

		// 3 access sizes x 2 operations, first field slowest
		assert_eq!(benchmarks.len(), 6);
		let configs = benchmarks
			.iter()
			.map(|benchmark| match benchmark {
				Benchmark::Single { config, .. } => config,
				Benchmark::Parallel { .. } => panic!("Expected single benchmarks"),
			})
			.collect::<Vec<_>>();

		let access_sizes = configs.iter().map(|config| config.access_size).collect::<Vec<_>>();
		assert_eq!(access_sizes, [256, 256, 1024, 1024, 4096, 4096]);
		for config in &configs {
			assert_eq!(config.matrix_args, ["access_size", "operation"]);
		}
	}

	#[test]
	fn definition_without_matrix_yields_one_benchmark() {
		let doc = doc(&format!("bm:\n{BASE_ARGS}"));
		let benchmarks = create_benchmarks(&doc, &NumaTopology::local()).unwrap();

		assert_eq!(benchmarks.len(), 1);
		assert_eq!(benchmarks[0].name(), "bm");
	}

	#[test]
	fn rejects_non_mapping_matrix() {
		let doc = doc(&format!("bm:\n{BASE_ARGS}  matrix: [1, 2]\n"));
		assert!(matches!(
			create_benchmarks(&doc, &NumaTopology::local()),
			Err(ConfigError::Definition { .. })
		));
	}

	#[test]
	fn rejects_empty_candidate_list() {
		let doc = doc(&format!("bm:\n{BASE_ARGS}  matrix:\n    access_size: []\n"));
		assert!(matches!(
			create_benchmarks(&doc, &NumaTopology::local()),
			Err(ConfigError::Definition { .. })
		));
	}

	#[test]
	fn rejects_unknown_definition_key() {
		let doc = doc(&format!("bm:\n{BASE_ARGS}  arsg: {{}}\n"));
		assert!(matches!(
			create_benchmarks(&doc, &NumaTopology::local()),
			Err(ConfigError::Definition { .. })
		));
	}

	#[test]
	fn invalid_combination_fails_expansion() {
		// access_size 100 is not a power of two
		let doc = doc(&format!("bm:\n{BASE_ARGS}  matrix:\n    access_size: [256, 100]\n"));
		assert!(matches!(
			create_benchmarks(&doc, &NumaTopology::local()),
			Err(ConfigError::Invalid { .. })
		));
	}

	/// A sub-workload definition indented for a `parallel_benchmark` block
	const SUB_ARGS: &str = r"
      args:
        memory_range: 64m
        min_io_chunk_size: 1m
        number_threads: 2
";

	#[test]
	fn parallel_definition_crosses_both_sides() {
		let doc = doc(&format!(
			"par:\n  parallel_benchmark:\n    reads:{SUB_ARGS}    writes:{SUB_ARGS}"
		));
		let benchmarks = create_benchmarks(&doc, &NumaTopology::local()).unwrap();

		assert_eq!(benchmarks.len(), 1);
		let Benchmark::Parallel { sub_names, .. } = &benchmarks[0] else {
			panic!("Expected a parallel benchmark");
		};
		assert_eq!(sub_names, &["reads".to_owned(), "writes".to_owned()]);
	}

	#[test]
	fn parallel_requires_exactly_two_sides() {
		let doc = doc(&format!("par:\n  parallel_benchmark:\n    only:{SUB_ARGS}"));
		assert!(matches!(
			create_benchmarks(&doc, &NumaTopology::local()),
			Err(ConfigError::Definition { .. })
		));
	}
}
