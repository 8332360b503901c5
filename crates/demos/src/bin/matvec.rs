//! Streamed matrix-vector workload built on side-effect dependencies.
//!
//! Each compute node fills a disjoint range of rows of a shared
//! output vector and produces no data. A sink node is ordered after
//! all of them with dependency edges only; once they have fired it
//! forwards the buffers to a drainer that re-checks every row.

use anyhow::Result;
use clap::Parser;
use mdf_interpreter::{
	graph::{Graph, NodeId},
	instruction::ParamDecl,
	printer::Printer,
	Drainer, InputToken, Interpreter, Streamer, Token,
};
use std::sync::{Arc, Mutex};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
	/// Rows (and columns) of the matrix
	dim: Option<usize>,

	/// Worker thread count; also the number of compute nodes
	threads: Option<usize>,

	/// Number of matrices to stream
	num_items: Option<usize>,
}

/// Everything the drainer needs to verify one finished item
#[derive(Clone)]
struct VerifyJob {
	mat: Arc<Vec<f64>>,
	input: Arc<Vec<f64>>,
	out: Arc<Mutex<Vec<f64>>>,
	dim: usize,
}

struct MatrixStreamer {
	compute: Vec<NodeId>,
	sink: NodeId,
	dim: usize,
	max_items: usize,
	num_items: usize,
}

impl Streamer for MatrixStreamer {
	fn next(&mut self) -> Vec<InputToken> {
		if self.num_items >= self.max_items {
			return Vec::new();
		}
		self.num_items += 1;

		let dim = self.dim;
		let mat = Arc::new(
			(0..dim * dim)
				.map(|k| k as f64 / self.num_items as f64)
				.collect::<Vec<_>>(),
		);
		let input = Arc::new(
			(0..dim)
				.map(|k| 1.0 + k as f64 / self.num_items as f64)
				.collect::<Vec<_>>(),
		);
		let out = Arc::new(Mutex::new(vec![0.0; dim]));

		// Spread rows over the compute nodes, one extra row each
		// until the residue is used up.
		let split = dim / self.compute.len();
		let mut residual = dim % self.compute.len();
		let mut first = 0;

		let mut batch = Vec::new();
		for node in &self.compute {
			let assigned = if residual > 0 {
				residual -= 1;
				split + 1
			} else {
				split
			};
			batch.push(InputToken::new(*node, "mat", Token::wrap(mat.clone())));
			batch.push(InputToken::new(*node, "vec", Token::wrap(input.clone())));
			batch.push(InputToken::new(*node, "out", Token::wrap(out.clone())));
			batch.push(InputToken::new(*node, "rows", Token::wrap((first, assigned))));
			first += assigned;
		}
		batch.push(InputToken::new(self.sink, "mat", Token::wrap(mat)));
		batch.push(InputToken::new(self.sink, "vec", Token::wrap(input)));
		batch.push(InputToken::new(self.sink, "out", Token::wrap(out)));
		batch.push(InputToken::new(self.sink, "dim", Token::wrap(dim)));
		batch
	}
}

/// Recomputes every row and counts mismatches
#[derive(Default)]
struct VerifyDrainer {
	verified: usize,
	mismatches: usize,
	bad_tokens: usize,
}

impl Drainer for VerifyDrainer {
	fn accept(&mut self, token: Token) {
		let job = match token.value::<VerifyJob>() {
			Some(job) => job,
			None => {
				self.bad_tokens += 1;
				return;
			}
		};

		let out = job.out.lock().unwrap();
		for i in 0..job.dim {
			let mut prod = 0.0;
			for j in 0..job.dim {
				prod += (job.mat[i * job.dim + j] * job.input[j]).sin();
			}
			if prod.sin() != out[i] {
				self.mismatches += 1;
			}
		}
		self.verified += 1;
	}
}

fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter("mdf_interpreter=error")
		.without_time()
		.with_ansi(true)
		.init();

	let args = Args::parse();
	let dim = args.dim.unwrap_or(10);
	let threads = args.threads.unwrap_or(1).min(dim);
	let num_items = args.num_items.unwrap_or(100);

	let out = Printer::stdout();
	out.println(format!(
		"streaming {num_items} items of dimension {dim}, running {threads} threads"
	));

	let mut graph = Graph::new();

	let compute = (0..threads)
		.map(|_| {
			graph.add_instruction(
				move |mat: Arc<Vec<f64>>,
				      input: Arc<Vec<f64>>,
				      out: Arc<Mutex<Vec<f64>>>,
				      rows: (usize, usize)| {
					let (first, count) = rows;
					let mut local = vec![0.0; count];
					for k in 0..count {
						let row = first + k;
						let mut prod = 0.0;
						for j in 0..dim {
							prod += (mat[row * dim + j] * input[j]).sin();
						}
						local[k] = prod.sin();
					}
					let mut out = out.lock().unwrap();
					out[first..first + count].copy_from_slice(&local);
				},
				(
					ParamDecl::<Arc<Vec<f64>>>::new("mat"),
					ParamDecl::<Arc<Vec<f64>>>::new("vec"),
					ParamDecl::<Arc<Mutex<Vec<f64>>>>::new("out"),
					ParamDecl::<(usize, usize)>::new("rows"),
				),
			)
		})
		.collect::<Vec<_>>();

	// The sink carries no data edges from the compute nodes; it just
	// forwards the buffers once every row range has been written.
	let sink = graph.add_instruction(
		|mat: Arc<Vec<f64>>, input: Arc<Vec<f64>>, out: Arc<Mutex<Vec<f64>>>, dim: usize| {
			VerifyJob {
				mat,
				input,
				out,
				dim,
			}
		},
		(
			ParamDecl::<Arc<Vec<f64>>>::new("mat"),
			ParamDecl::<Arc<Vec<f64>>>::new("vec"),
			ParamDecl::<Arc<Mutex<Vec<f64>>>>::new("out"),
			ParamDecl::<usize>::new("dim"),
		),
	);

	for node in &compute {
		graph.declare_dependency(*node, sink);
	}

	let mut interpreter = Interpreter::new(graph, threads, VerifyDrainer::default());
	interpreter.start(MatrixStreamer {
		compute,
		sink,
		dim,
		max_items: num_items,
		num_items: 0,
	})?;

	let drainer = interpreter.into_drainer();
	out.println(format!(
		"verified {} items, {} mismatched rows",
		drainer.verified, drainer.mismatches
	));
	anyhow::ensure!(drainer.bad_tokens == 0, "drainer saw tokens of the wrong type");
	anyhow::ensure!(drainer.mismatches == 0, "output verification failed");
	Ok(())
}
