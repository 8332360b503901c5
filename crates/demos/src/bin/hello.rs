//! Smallest possible workload: a two-instruction chain fed by a
//! pseudo-random stream.

use anyhow::Result;
use clap::Parser;
use mdf_interpreter::{
	graph::{Graph, NodeId},
	instruction::ParamDecl,
	printer::Printer,
	Drainer, InputToken, Interpreter, Streamer, Token,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
	/// Worker thread count
	threads: Option<usize>,

	/// Seed for the input stream
	seed: Option<u64>,
}

/// Emits one `(int, float)` pair per step until a ~1% draw stops it
struct RandomStreamer {
	foo: NodeId,
	rng: StdRng,
}

impl Streamer for RandomStreamer {
	fn next(&mut self) -> Vec<InputToken> {
		if self.rng.gen::<f64>() * 10.0 > 9.9 {
			return Vec::new();
		}
		vec![
			InputToken::new(self.foo, "p1", Token::wrap(self.rng.gen_range(0..100_i64))),
			InputToken::new(self.foo, "p2", Token::wrap(self.rng.gen::<f64>() * 10.0)),
		]
	}
}

struct PrintDrainer {
	out: Arc<Printer>,
}

impl Drainer for PrintDrainer {
	fn accept(&mut self, token: Token) {
		match token.value::<i64>() {
			Some(value) => self.out.println(format!("drained: {value}")),
			None => self.out.println("drainer: unexpected token type"),
		}
	}
}

fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter("mdf_interpreter=error")
		.without_time()
		.with_ansi(true)
		.init();

	let args = Args::parse();
	let threads = args.threads.unwrap_or(2);
	let seed = args.seed.unwrap_or(0);

	let mut graph = Graph::new();
	let foo = graph.add_instruction(
		|x: i64, y: f64| -> i64 {
			if x % 2 == 1 {
				y.floor() as i64
			} else {
				y.ceil() as i64
			}
		},
		(ParamDecl::<i64>::new("p1"), ParamDecl::<f64>::new("p2")),
	);
	let bar = graph.add_instruction(|z: i64| -> i64 { z * 2 }, (ParamDecl::<i64>::new("z"),));
	graph.connect(foo, bar, "z");

	let out = Arc::new(Printer::stdout());
	out.println(format!("running {threads} threads, seed {seed}"));

	let mut interpreter = Interpreter::new(graph, threads, PrintDrainer { out: out.clone() });
	interpreter.start(RandomStreamer {
		foo,
		rng: StdRng::seed_from_u64(seed),
	})?;

	out.println("done");
	Ok(())
}
