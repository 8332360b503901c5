//! Errors we may encounter while running a graph

use smartstring::{LazyCompact, SmartString};
use std::{error::Error, fmt::Display};

use crate::graph::NodeId;

/// An error we encounter when an instruction fires
#[derive(Debug)]
pub enum ExecuteError {
	/// A declared parameter had no token in the input map.
	///
	/// The scheduler only fires a node once its token count matches
	/// its arity, so this means an edge was connected to a name the
	/// destination never declared.
	MissingParameter {
		/// The parameter that was missing
		param_name: SmartString<LazyCompact>,
	},

	/// A token's dynamic type did not match the declared
	/// parameter type
	BadParameterType {
		/// The parameter with the mismatched token
		param_name: SmartString<LazyCompact>,

		/// The type the instruction declared
		expected: &'static str,

		/// The type the token actually wraps
		actual: &'static str,
	},
}

impl Display for ExecuteError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::MissingParameter { param_name } => {
				write!(f, "Missing parameter `{param_name}`")
			}
			Self::BadParameterType {
				param_name,
				expected,
				actual,
			} => {
				write!(
					f,
					"Bad type for parameter `{param_name}`: expected {expected}, got {actual}"
				)
			}
		}
	}
}

impl Error for ExecuteError {}

/// A fatal error that ends a run.
///
/// Workers publish the first error they hit and every thread shuts
/// down; [`crate::Interpreter::start`] returns it to the caller.
#[derive(Debug)]
pub enum StartError {
	/// An instruction failed to fire
	Instruction {
		/// The node that failed
		node: NodeId,

		/// What went wrong
		error: ExecuteError,
	},

	/// An instruction body panicked
	BodyPanic {
		/// The node whose body panicked
		node: NodeId,

		/// The panic payload, if it was a string
		message: String,
	},
}

impl Display for StartError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Instruction { node, error } => {
				write!(f, "Instruction at node {} failed: {error}", node.as_usize())
			}
			Self::BodyPanic { node, message } => {
				write!(f, "Body of node {} panicked: {message}", node.as_usize())
			}
		}
	}
}

impl Error for StartError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			Self::Instruction { error, .. } => Some(error),
			_ => None,
		}
	}
}
