//! Traits that connect external code to the interpreter

use crate::{
	graph::{NodeId, ParamAddress},
	labels::ParamName,
	token::Token,
};

/// One initial token assignment produced by a [`Streamer`].
///
/// If the same `(node, param)` pair is assigned twice before the node
/// fires, the second token silently replaces the first; that is a
/// streamer bug, not something the interpreter diagnoses.
#[derive(Debug, Clone)]
pub struct InputToken {
	/// Where the token goes
	pub destination: ParamAddress,

	/// The token itself
	pub token: Token,
}

impl InputToken {
	/// Address a token at the given node and parameter
	pub fn new(node: NodeId, param: &str, token: Token) -> Self {
		Self {
			destination: ParamAddress {
				node,
				param: ParamName::new(param),
			},
			token,
		}
	}
}

/// Produces the input stream.
///
/// Each call to [`Streamer::next`] yields the initial token
/// assignments of one graph instance. An empty batch is the only
/// end-of-stream signal; `next` is never called again after one.
pub trait Streamer {
	/// The next batch of initial tokens
	fn next(&mut self) -> Vec<InputToken>;
}

/// Consumes terminal tokens.
///
/// The interpreter serializes calls to [`Drainer::accept`] with a
/// mutex, so implementations need no internal synchronization.
/// Terminal tokens from different graph instances arrive in no
/// particular order.
pub trait Drainer: Send {
	/// Take one terminal token
	fn accept(&mut self, token: Token);
}
