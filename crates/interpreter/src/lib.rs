//! Fast, parallel macro-dataflow interpretation.
//!
//! Build a [`graph::Graph`] of typed instructions connected by data
//! edges and side-effect dependencies, hand it to an [`Interpreter`]
//! together with a [`Drainer`], and feed it one graph instance per
//! [`Streamer`] batch. Instances execute concurrently on a pool of
//! work-stealing workers; every terminal output is handed to the
//! drainer exactly once.

#![warn(missing_docs)]

pub mod api;
pub mod errors;
pub mod graph;
pub mod instruction;
pub mod labels;
pub mod map;
pub mod printer;
pub mod queue;
pub mod runner;
pub mod token;

pub use api::{Drainer, InputToken, Streamer};
pub use runner::Interpreter;
pub use token::Token;
