//! Mandelbrot renderer.
//!
//! The image is streamed block by block. Leaf nodes render disjoint
//! line bands of a block into a shared pixel buffer and return their
//! local iteration maximum; a pairwise max tree reduces the sixteen
//! band maxima to one value per block, which the drainer folds into
//! the global maximum used for tone mapping. The finished histogram
//! is written out as a binary PPM.

use anyhow::Result;
use clap::Parser;
use itertools::Itertools;
use mdf_interpreter::{
	graph::{Graph, NodeId},
	instruction::ParamDecl,
	printer::Printer,
	Drainer, InputToken, Interpreter, Streamer, Token,
};
use std::{
	fs::File,
	io::{BufWriter, Write},
	sync::{
		atomic::{AtomicI32, Ordering},
		Arc,
	},
};

const MAX_ITER: i32 = 10_000;
const SIZE: usize = 1 << 10;
const BLOCK_SIZE: usize = 1 << 6;
const N_LINES: usize = 1 << 2;

type PixelBuffer = Arc<Vec<AtomicI32>>;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
	/// Worker thread count
	threads: Option<usize>,
}

struct BlockStreamer {
	leaves: Vec<NodeId>,
	pixels: PixelBuffer,
	index: usize,
}

impl BlockStreamer {
	const BLOCKS_PER_SIDE: usize = SIZE / BLOCK_SIZE;
	const N_BLOCKS: usize = Self::BLOCKS_PER_SIDE * Self::BLOCKS_PER_SIDE;
}

impl Streamer for BlockStreamer {
	fn next(&mut self) -> Vec<InputToken> {
		if self.index >= Self::N_BLOCKS {
			return Vec::new();
		}

		let x0 = (self.index % Self::BLOCKS_PER_SIDE) * BLOCK_SIZE;
		let ybase = SIZE - 1 - (self.index / Self::BLOCKS_PER_SIDE) * BLOCK_SIZE;
		self.index += 1;

		let mut batch = Vec::new();
		for (i, leaf) in self.leaves.iter().enumerate() {
			batch.push(InputToken::new(*leaf, "hst", Token::wrap(self.pixels.clone())));
			batch.push(InputToken::new(*leaf, "x0", Token::wrap(x0 as i64)));
			batch.push(InputToken::new(
				*leaf,
				"y0",
				Token::wrap((ybase - i * N_LINES) as i64),
			));
		}
		batch
	}
}

/// Folds per-block maxima into the global iteration maximum
#[derive(Default)]
struct MaxDrainer {
	max: i32,
	bad_tokens: usize,
}

impl Drainer for MaxDrainer {
	fn accept(&mut self, token: Token) {
		match token.value::<i32>() {
			Some(value) => self.max = self.max.max(value),
			None => self.bad_tokens += 1,
		}
	}
}

fn write_ppm(name: &str, pixels: &[AtomicI32], max_val: i32) -> std::io::Result<()> {
	let mut out = BufWriter::new(File::create(format!("{name}.ppm"))?);
	writeln!(out, "P6 {SIZE} {SIZE} 255")?;
	let max_val = max_val.max(1);
	for px in pixels {
		let iter = px.load(Ordering::Relaxed);
		if iter == MAX_ITER {
			out.write_all(&[0, 0, 0])?;
		} else {
			let intensity = (1.0 - iter as f32 / max_val as f32).powf(8.0);
			out.write_all(&[
				(intensity * 128.0) as u8,
				(intensity * 128.0) as u8,
				(intensity * 255.0) as u8,
			])?;
		}
	}
	out.flush()
}

fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter("mdf_interpreter=error")
		.without_time()
		.with_ansi(true)
		.init();

	let args = Args::parse();
	let threads = args.threads.unwrap_or(2);

	let out = Printer::stdout();

	// A close zoom near the Misiurewicz point
	let re0 = -0.74364396916876561516;
	let w = -0.74364381764268717490 - re0;
	let im0 = 0.13182588262473313035;
	let h = 0.13182603415081157061 - im0;

	let mut graph = Graph::new();

	let nsplits = BLOCK_SIZE / N_LINES;
	let leaves = (0..nsplits)
		.map(|_| {
			graph.add_instruction(
				move |hst: PixelBuffer, x0: i64, y0: i64| -> i32 {
					let mut max_iter = 0;
					for k in 0..N_LINES {
						for j in 0..BLOCK_SIZE {
							let re_c = re0 + (x0 as f64 + j as f64) * w / SIZE as f64;
							let im_c = im0 + (y0 as f64 - k as f64) * h / SIZE as f64;
							let mut re = 0.0_f64;
							let mut im = 0.0_f64;
							let mut i = 0;
							while i < MAX_ITER && re * re + im * im <= 4.0 {
								let tmp = re * re - im * im + re_c;
								im = 2.0 * re * im + im_c;
								re = tmp;
								i += 1;
							}
							let row = SIZE - 1 - (y0 as usize - k);
							hst[row * SIZE + x0 as usize + j].store(i, Ordering::Relaxed);
							if max_iter < i {
								max_iter = i;
							}
						}
					}
					max_iter
				},
				(
					ParamDecl::<PixelBuffer>::new("hst"),
					ParamDecl::<i64>::new("x0"),
					ParamDecl::<i64>::new("y0"),
				),
			)
		})
		.collect::<Vec<_>>();

	// Pairwise max tree down to a single per-block result
	let mut stage = leaves.clone();
	while stage.len() > 1 {
		stage = stage
			.iter()
			.tuples()
			.map(|(left, right)| {
				let max = graph.add_instruction(
					|a: i32, b: i32| -> i32 { a.max(b) },
					(ParamDecl::<i32>::new("a"), ParamDecl::<i32>::new("b")),
				);
				graph.connect(*left, max, "a");
				graph.connect(*right, max, "b");
				max
			})
			.collect();
	}

	let pixels: PixelBuffer = Arc::new((0..SIZE * SIZE).map(|_| AtomicI32::new(0)).collect());

	out.println(format!(
		"rendering {SIZE}x{SIZE} in {} blocks, running {threads} threads",
		BlockStreamer::N_BLOCKS
	));

	let mut interpreter = Interpreter::new(graph, threads, MaxDrainer::default());
	interpreter.start(BlockStreamer {
		leaves,
		pixels: pixels.clone(),
		index: 0,
	})?;

	let drainer = interpreter.into_drainer();
	anyhow::ensure!(drainer.bad_tokens == 0, "drainer saw tokens of the wrong type");

	out.println(format!("max iterations: {}", drainer.max));
	write_ppm("image", &pixels, drainer.max)?;
	out.println("wrote image.ppm");
	Ok(())
}
