//! Thread-safe diagnostics printing

use std::{
	io::{self, Write},
	sync::Mutex,
};

/// A line printer usable from many threads at once.
///
/// Each call writes one full line under a mutex, so output from
/// concurrent workers never interleaves. Engine internals log through
/// `tracing` instead; this exists for workload output.
pub struct Printer {
	target: Mutex<Box<dyn Write + Send>>,
}

impl Printer {
	/// A printer over an arbitrary writer
	pub fn new(target: Box<dyn Write + Send>) -> Self {
		Self {
			target: Mutex::new(target),
		}
	}

	/// A printer over stdout
	pub fn stdout() -> Self {
		Self::new(Box::new(io::stdout()))
	}

	/// A printer over stderr
	pub fn stderr() -> Self {
		Self::new(Box::new(io::stderr()))
	}

	/// Print one line.
	/// Write failures are swallowed; diagnostics are best-effort.
	pub fn println(&self, line: impl AsRef<str>) {
		let mut target = self.target.lock().unwrap();
		let _ = writeln!(target, "{}", line.as_ref());
		let _ = target.flush();
	}
}
