//! A six-instruction sine chain.
//!
//! Graph topology:
//!
//! ```text
//!         i1
//!     +----+----+
//!     |    |    |
//!    i2   i3   i4
//!     \   /    /
//!      i5     /
//!        \   /
//!         i6
//! ```
//!
//! Every body loops `n` times over `sin`, so the per-node cost is
//! tunable from the command line.

use anyhow::Result;
use clap::Parser;
use mdf_interpreter::{
	graph::{Graph, NodeId},
	instruction::ParamDecl,
	printer::Printer,
	Drainer, InputToken, Interpreter, Streamer, Token,
};
use std::f64::consts::PI;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
	/// Number of graph instances to stream
	num_items: Option<usize>,

	/// Worker thread count
	threads: Option<usize>,

	/// Iterations of the inner sine loop in every body
	loops: Option<usize>,
}

struct ItemStreamer {
	i1: NodeId,
	i6: NodeId,
	max_items: usize,
	num_items: usize,
}

impl Streamer for ItemStreamer {
	fn next(&mut self) -> Vec<InputToken> {
		if self.num_items >= self.max_items {
			return Vec::new();
		}
		self.num_items += 1;
		vec![
			InputToken::new(self.i1, "input1", Token::wrap(self.num_items as i64)),
			InputToken::new(
				self.i1,
				"input2",
				Token::wrap(PI / self.num_items as f64),
			),
			InputToken::new(self.i6, "counter", Token::wrap(self.num_items as i64)),
		]
	}
}

/// Counts results; the values themselves are scratch work
#[derive(Default)]
struct CountingDrainer {
	received: usize,
	bad: usize,
}

impl Drainer for CountingDrainer {
	fn accept(&mut self, token: Token) {
		match token.value::<(i64, f64)>() {
			Some(_) => self.received += 1,
			None => self.bad += 1,
		}
	}
}

fn sin_loop(mut x: f64, n: usize) -> f64 {
	for _ in 0..n {
		x = x.sin();
	}
	x
}

fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter("mdf_interpreter=error")
		.without_time()
		.with_ansi(true)
		.init();

	let args = Args::parse();
	let num_items = args.num_items.unwrap_or(100);
	let threads = args.threads.unwrap_or(1);
	let n = args.loops.unwrap_or(100);

	let out = Printer::stdout();
	out.println(format!(
		"streaming {num_items} items, running {threads} threads, looping {n} times in each body"
	));

	let mut graph = Graph::new();

	let i1 = graph.add_instruction(
		move |in1: i64, in2: f64| -> f64 { sin_loop(in1 as f64 + in2, n) },
		(ParamDecl::<i64>::new("input1"), ParamDecl::<f64>::new("input2")),
	);
	let i2 = graph.add_instruction(
		move |x: f64| -> f64 { sin_loop(x + 1.0, n) },
		(ParamDecl::<f64>::new("x"),),
	);
	let i3 = graph.add_instruction(
		move |x: f64| -> f64 { sin_loop(x + 2.0, n) },
		(ParamDecl::<f64>::new("x"),),
	);
	let i4 = graph.add_instruction(
		move |x: f64| -> f64 { sin_loop(x + 3.0, n) },
		(ParamDecl::<f64>::new("x"),),
	);
	let i5 = graph.add_instruction(
		move |y1: f64, y2: f64| -> f64 { sin_loop(y1 + y2 + 4.0, n) },
		(ParamDecl::<f64>::new("y1"), ParamDecl::<f64>::new("y2")),
	);
	let i6 = graph.add_instruction(
		move |y: f64, z: f64, c: i64| -> (i64, f64) { (c, sin_loop(y + z + 5.0, n)) },
		(
			ParamDecl::<f64>::new("y"),
			ParamDecl::<f64>::new("z"),
			ParamDecl::<i64>::new("counter"),
		),
	);

	graph.connect(i1, i2, "x");
	graph.connect(i1, i3, "x");
	graph.connect(i1, i4, "x");
	graph.connect(i2, i5, "y1");
	graph.connect(i3, i5, "y2");
	graph.connect(i5, i6, "y");
	graph.connect(i4, i6, "z");

	let mut interpreter = Interpreter::new(graph, threads, CountingDrainer::default());
	interpreter.start(ItemStreamer {
		i1,
		i6,
		max_items: num_items,
		num_items: 0,
	})?;

	let drainer = interpreter.into_drainer();
	out.println(format!("drained {} results", drainer.received));
	anyhow::ensure!(drainer.bad == 0, "{} results had the wrong type", drainer.bad);
	anyhow::ensure!(
		drainer.received == num_items,
		"expected {num_items} results, got {}",
		drainer.received
	);
	Ok(())
}
