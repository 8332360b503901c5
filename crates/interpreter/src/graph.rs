//! Static dataflow topology

use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt::Debug, sync::Arc};

use crate::{
	instruction::{FnInstruction, Instruction},
	labels::ParamName,
};

/// The ordinal id of a node in a [`Graph`].
///
/// Ids are assigned sequentially from zero as instructions are added
/// and are stable across clones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
	/// Get this id as a `usize`
	pub fn as_usize(&self) -> usize {
		self.0
	}

	/// Make an id from a `usize`
	pub fn from_usize(value: usize) -> Self {
		NodeId(value)
	}
}

impl From<NodeId> for usize {
	fn from(value: NodeId) -> Self {
		value.0
	}
}

/// The input port a data edge ends at:
/// a node and one of its declared parameter names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamAddress {
	/// The destination node
	pub node: NodeId,

	/// The destination parameter
	pub param: ParamName,
}

/// A graph vertex: one instruction plus its outgoing edges
#[derive(Clone)]
pub struct Node {
	id: NodeId,
	instruction: Arc<dyn Instruction>,

	/// Data edges out of this node.
	/// The fired result is routed to every address in this set.
	links: HashSet<ParamAddress>,

	/// Nodes that must wait for this node, without receiving data
	dependents: HashSet<NodeId>,

	/// Number of distinct nodes this node waits on
	depends_on: u32,
}

impl Debug for Node {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Node")
			.field("id", &self.id)
			.field("arity", &self.instruction.arity())
			.field("links", &self.links)
			.field("dependents", &self.dependents)
			.field("depends_on", &self.depends_on)
			.finish()
	}
}

impl Node {
	/// This node's id
	pub fn id(&self) -> NodeId {
		self.id
	}

	/// This node's instruction, shared with every clone
	pub fn instruction(&self) -> &Arc<dyn Instruction> {
		&self.instruction
	}

	/// Data edges out of this node
	pub fn links(&self) -> &HashSet<ParamAddress> {
		&self.links
	}

	/// Nodes ordered after this node without receiving data
	pub fn dependents(&self) -> &HashSet<NodeId> {
		&self.dependents
	}

	/// Number of distinct nodes this node waits on
	pub fn depends_on(&self) -> u32 {
		self.depends_on
	}

	/// A node with no outgoing data edges and no dependents is
	/// terminal: its output goes to the drainer.
	pub fn is_terminal(&self) -> bool {
		self.links.is_empty() && self.dependents.is_empty()
	}
}

/// A static dataflow topology.
///
/// Built once with [`Graph::add_instruction`], [`Graph::connect`] and
/// [`Graph::declare_dependency`], then cloned per graph instance once
/// a run starts. Clones copy the topology and share the instruction
/// bodies.
#[derive(Debug, Clone, Default)]
pub struct Graph {
	nodes: Vec<Node>,
}

impl Graph {
	/// Create an empty graph
	pub fn new() -> Self {
		Self { nodes: Vec::new() }
	}

	/// Append a node running the given body.
	///
	/// The node's arity equals the number of declared parameters.
	/// Parameter names must be unique within this node; nothing
	/// checks uniqueness across the graph.
	pub fn add_instruction<F, P>(&mut self, body: F, params: P) -> NodeId
	where
		FnInstruction<F, P>: Instruction + 'static,
	{
		let id = NodeId(self.nodes.len());
		self.nodes.push(Node {
			id,
			instruction: Arc::new(FnInstruction::new(body, params)),
			links: HashSet::new(),
			dependents: HashSet::new(),
			depends_on: 0,
		});
		id
	}

	/// Add a data edge from `src`'s output to the `param` input of
	/// `dst`. Returns `true` if the edge was inserted, `false` if an
	/// identical edge already exists.
	///
	/// `param` must be a parameter `dst` declares. A bad name is not
	/// caught here; it surfaces as a missing parameter when the
	/// destination fires (or as a deadlocked instance).
	///
	/// # Panics
	/// Panics if either id is not in this graph.
	pub fn connect(&mut self, src: NodeId, dst: NodeId, param: &str) -> bool {
		assert!(src.0 < self.nodes.len(), "connect: bad source node id {}", src.0);
		assert!(dst.0 < self.nodes.len(), "connect: bad destination node id {}", dst.0);
		self.nodes[src.0].links.insert(ParamAddress {
			node: dst,
			param: ParamName::new(param),
		})
	}

	/// Declare that `dst` must not fire before `src` has fired.
	///
	/// No token travels along this edge. Duplicate declarations are
	/// idempotent. Cycles are not checked; a cyclic instance never
	/// fires.
	///
	/// # Panics
	/// Panics if either id is not in this graph.
	pub fn declare_dependency(&mut self, src: NodeId, dst: NodeId) {
		assert!(src.0 < self.nodes.len(), "declare_dependency: bad source node id {}", src.0);
		assert!(
			dst.0 < self.nodes.len(),
			"declare_dependency: bad destination node id {}",
			dst.0
		);
		if self.nodes[src.0].dependents.insert(dst) {
			self.nodes[dst.0].depends_on += 1;
		}
	}

	/// Get a node by id.
	///
	/// # Panics
	/// Panics if the id is not in this graph.
	pub fn node(&self, id: NodeId) -> &Node {
		&self.nodes[id.0]
	}

	/// The number of nodes in this graph
	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	/// Iterate over all nodes in this graph
	pub fn iter_nodes(&self) -> impl Iterator<Item = &Node> {
		self.nodes.iter()
	}

	/// The number of terminal nodes.
	/// Every instance of this graph produces exactly this many
	/// drainer calls.
	pub fn terminal_count(&self) -> usize {
		self.nodes.iter().filter(|n| n.is_terminal()).count()
	}
}
