use std::fmt;
use std::io::{self, BufRead, BufReader};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

/// Input stream shared by every evaluation of an [`Engine`](crate::Engine).
///
/// Reads from concurrent evaluations interleave at call granularity.
#[derive(Clone)]
pub struct Input(Arc<Mutex<Box<dyn BufRead + Send>>>);

impl Input {
	pub fn new(reader: impl BufRead + Send + 'static) -> Self {
		Self(Arc::new(Mutex::new(Box::new(reader))))
	}

	pub fn stdin() -> Self {
		Self::new(BufReader::new(io::stdin()))
	}

	pub fn empty() -> Self {
		Self::new(io::empty())
	}

	pub(crate) fn lock(&self) -> MutexGuard<'_, Box<dyn BufRead + Send>> {
		self.0.lock()
	}
}

impl Default for Input {
	fn default() -> Self {
		Self::empty()
	}
}

impl fmt::Debug for Input {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Input").finish_non_exhaustive()
	}
}
