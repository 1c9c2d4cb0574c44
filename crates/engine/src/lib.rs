//! Sandboxed Lua evaluation for lmb.
//!
//! An [`Engine`] owns the process-wide pieces: the [`CompileCache`], the
//! shared [`Store`] and the input stream. Every [`Engine::eval`] builds a
//! fresh interpreter, registers the capability modules (`io`, `@lmb`, `json`,
//! `logger`, `re`, `url`, `crypto`, `http`) into `package.preload`, runs the
//! compiled chunk under a [`Deadline`], and tears the interpreter down again.
//! Nothing Lua-side survives between evaluations; only the [`Store`] does.

mod compile;
mod deadline;
mod error;
mod input;
mod modules;
mod sandbox;
mod state;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

pub use compile::{CompileCache, CompiledUnit, compile};
pub use deadline::Deadline;
pub use error::{ErrorKind, EvalError, Result, SyntaxPosition};
pub use input::Input;
use lmb_store::Store;
pub use lmb_value::{Map, Value};
pub use state::EvaluationState;

/// Tunables for every evaluation run by an [`Engine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
	/// VM instructions between deadline checks.
	pub hook_interval: u32,
	/// Request timeout for the `http` capability module.
	pub http_timeout: Duration,
	/// Maximum table nesting when converting script values.
	pub max_depth: usize,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			hook_interval: 1000,
			http_timeout: Duration::from_secs(30),
			max_depth: lmb_value::MAX_DEPTH,
		}
	}
}

/// Result of [`Engine::spawn_eval`]: the value plus everything the script
/// left behind for the host.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalOutcome {
	pub value: Value,
	pub state: EvaluationState,
	pub output: Vec<u8>,
}

#[derive(Debug)]
pub struct Engine {
	store: Arc<Store>,
	input: Input,
	config: EngineConfig,
	cache: CompileCache,
}

impl Engine {
	pub fn new(store: Arc<Store>) -> Self {
		Self {
			store,
			input: Input::empty(),
			config: EngineConfig::default(),
			cache: CompileCache::new(),
		}
	}

	pub fn with_input(mut self, input: Input) -> Self {
		self.input = input;
		self
	}

	pub fn with_config(mut self, config: EngineConfig) -> Self {
		self.config = config;
		self
	}

	pub fn store(&self) -> &Arc<Store> {
		&self.store
	}

	pub fn input(&self) -> &Input {
		&self.input
	}

	pub fn config(&self) -> &EngineConfig {
		&self.config
	}

	pub fn cache(&self) -> &CompileCache {
		&self.cache
	}

	/// Returns the cached unit for `source`, compiling it on first use.
	pub fn compile(&self, source: &[u8], name: &str) -> Result<Arc<CompiledUnit>> {
		self.cache.find_or_compile(source, name)
	}

	/// Runs `unit` in a fresh sandbox on the current thread.
	///
	/// `state` is moved into the sandbox and written back before returning,
	/// on failure too. Script output is buffered and written to `output` once
	/// the chunk finishes; with no sink it is discarded.
	pub fn eval(&self, unit: &CompiledUnit, state: &mut EvaluationState, deadline: Deadline, output: Option<&mut dyn Write>) -> Result<Value> {
		sandbox::run(self, unit, state, deadline, output)
	}

	/// Runs [`Engine::eval`] on the blocking pool, capturing output.
	pub async fn spawn_eval(self: Arc<Self>, unit: Arc<CompiledUnit>, state: EvaluationState, deadline: Deadline) -> Result<EvalOutcome> {
		tokio::task::spawn_blocking(move || {
			let mut state = state;
			let mut output = Vec::new();
			let value = self.eval(&unit, &mut state, deadline, Some(&mut output))?;
			Ok(EvalOutcome { value, state, output })
		})
		.await
		.map_err(|err| EvalError::Join(err.to_string()))?
	}
}

#[cfg(test)]
mod tests;
