//! Helpful types

use serde::{Deserialize, Serialize};
use smartstring::{LazyCompact, SmartString};
use std::fmt::Display;

/// The name of one instruction parameter.
///
/// Parameter names are unique within a single instruction and are
/// matched by string equality when tokens are routed.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ParamName {
	x: SmartString<LazyCompact>,
}

impl ParamName {
	/// Make a new parameter name
	pub fn new(name: &str) -> Self {
		Self { x: name.into() }
	}

	/// Get the name
	pub fn name(&self) -> &SmartString<LazyCompact> {
		&self.x
	}
}

impl Display for ParamName {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.x.fmt(f)
	}
}

impl From<String> for ParamName {
	fn from(value: String) -> Self {
		Self::new(&value)
	}
}

impl From<&str> for ParamName {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}
