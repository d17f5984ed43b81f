//! NUMA capability
//!
//! Node discovery is performed by an external collaborator; the core
//! only consumes an explicit topology and a best-effort "restrict the
//! current thread to a node set" operation.

// Imports
use crate::config::NumaPattern;

/// Memory topology, split into near and far node sets relative to the
/// benchmarked region
#[derive(Clone, Debug)]
pub struct NumaTopology {
	/// Near (local) nodes
	near_nodes: Vec<usize>,

	/// Topologically far nodes
	far_nodes: Vec<usize>,
}

impl NumaTopology {
	/// Creates a topology from explicit node sets
	pub fn new(near_nodes: Vec<usize>, far_nodes: Vec<usize>) -> Self {
		Self { near_nodes, far_nodes }
	}

	/// Creates a single-node topology with no far nodes
	pub fn local() -> Self {
		Self::new(vec![0], vec![])
	}

	/// Returns whether any far node exists
	pub fn has_far_nodes(&self) -> bool {
		!self.far_nodes.is_empty()
	}

	/// Returns the node set for `pattern`
	pub fn nodes_for(&self, pattern: NumaPattern) -> &[usize] {
		match pattern {
			NumaPattern::Near => &self.near_nodes,
			NumaPattern::Far => &self.far_nodes,
		}
	}

	/// Restricts the current thread's execution to the nodes of `pattern`.
	///
	/// Best-effort: without an external binding collaborator this only
	/// records the decision.
	pub fn pin_current_thread(&self, pattern: NumaPattern) {
		let nodes = self.nodes_for(pattern);
		tracing::trace!(?pattern, ?nodes, "Pinning current thread");
	}
}

impl Default for NumaTopology {
	fn default() -> Self {
		Self::local()
	}
}
