//! Per-instance execution state

use std::sync::{Arc, Mutex};

use crate::{
	graph::{Graph, Node, NodeId},
	instruction::TokenMap,
	map::ShardedMap,
};

/// The mutable state of one node within one graph instance.
///
/// Created lazily when the first token or dependency bump arrives.
/// All reads and writes happen under the owning mutex.
#[derive(Debug, Default)]
pub(super) struct InstructionState {
	/// Set once this node has been scheduled.
	/// Never unset; a node fires exactly once per instance.
	pub fired: bool,

	/// How many of this node's dependency sources have fired
	pub resolved_dependencies: u32,

	/// Tokens received so far, keyed by parameter name
	pub tokens: TokenMap,
}

pub(super) type SharedState = Arc<Mutex<InstructionState>>;

/// One live graph instance: a clone of the static graph plus the
/// state of every node that has received anything.
///
/// Shared by the driver and every worker holding a task that targets
/// it; dropped when the last of them lets go.
pub(super) struct GraphHandle {
	pub instance_id: u64,
	pub graph: Arc<Graph>,
	pub states: ShardedMap<NodeId, SharedState>,
}

impl GraphHandle {
	pub fn new(instance_id: u64, graph: Graph) -> Self {
		Self {
			instance_id,
			graph: Arc::new(graph),
			states: ShardedMap::new(),
		}
	}

	/// Fetch the state of `id`, creating it on first access
	pub fn state(&self, id: NodeId) -> SharedState {
		match self.states.get(&id) {
			Some(state) => state,
			None => {
				self.states
					.insert(id, Arc::new(Mutex::new(InstructionState::default())))
					.0
			}
		}
	}
}

/// A unit of scheduled work: one fireable node of one instance
#[derive(Clone)]
pub(super) struct Task {
	pub handle: Arc<GraphHandle>,
	pub id: NodeId,
}

/// Check fireability and mark the node fired.
///
/// Must be called with `state`'s lock held so the check is atomic
/// against concurrent token writes and dependency bumps. Returns
/// `true` exactly once per node per instance: when every declared
/// parameter has a token, every dependency source has fired, and the
/// node has not been scheduled yet. The caller enqueues the task.
pub(super) fn try_fire(state: &mut InstructionState, node: &Node) -> bool {
	if !state.fired
		&& state.resolved_dependencies == node.depends_on()
		&& state.tokens.len() == node.instruction().arity()
	{
		state.fired = true;
		true
	} else {
		false
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::instruction::ParamDecl;
	use crate::labels::ParamName;
	use crate::token::Token;

	fn graph_with_dependency() -> Graph {
		let mut graph = Graph::new();
		let a = graph.add_instruction(|x: i64| -> i64 { x }, (ParamDecl::<i64>::new("x"),));
		let b = graph.add_instruction(|y: i64| -> i64 { y }, (ParamDecl::<i64>::new("y"),));
		graph.declare_dependency(a, b);
		graph
	}

	#[test]
	fn fires_only_when_tokens_and_dependencies_are_ready() {
		let graph = graph_with_dependency();
		let b = graph.node(NodeId::from_usize(1));

		let mut state = InstructionState::default();
		assert!(!try_fire(&mut state, b));

		state.tokens.insert(ParamName::new("y"), Token::wrap(1_i64));
		// Data is ready but the dependency source has not fired
		assert!(!try_fire(&mut state, b));

		state.resolved_dependencies = 1;
		assert!(try_fire(&mut state, b));

		// Fired is sticky: never schedule twice
		assert!(!try_fire(&mut state, b));
	}

	#[test]
	fn handle_creates_states_lazily() {
		let graph = graph_with_dependency();
		let handle = GraphHandle::new(0, graph);
		assert_eq!(handle.states.len(), 0);

		let first = handle.state(NodeId::from_usize(0));
		let again = handle.state(NodeId::from_usize(0));
		assert!(Arc::ptr_eq(&first, &again));
		assert_eq!(handle.states.len(), 1);
	}
}
