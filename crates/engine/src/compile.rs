//! Source -> bytecode compilation and the process-wide compile cache.

use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::Instant;

use mlua::{ChunkMode, Lua, LuaOptions, StdLib};
use parking_lot::RwLock;
use regex::Regex;
use rustc_hash::FxHashMap;
use tracing::trace;
use xxhash_rust::xxh3::xxh3_64;

use crate::error::{EvalError, Result, SyntaxPosition};

/// `<chunk>:<line>: <detail>`. The chunk part may be a truncated copy of the
/// name, so it is matched loosely.
static LINE_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(?s:.*?):(\d+):\s*((?s:.*))$").expect("valid regex"));
static NEAR_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"near (?:'(.*)'|(<eof>))\s*$").expect("valid regex"));

/// Immutable, executable form of one script source.
///
/// Units are keyed by the xxh3 hash of their exact source bytes and hold
/// Lua bytecode, so executing one never mutates it.
pub struct CompiledUnit {
	hash: u64,
	name: String,
	bytecode: Vec<u8>,
}

impl CompiledUnit {
	pub fn hash(&self) -> u64 {
		self.hash
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub(crate) fn bytecode(&self) -> &[u8] {
		&self.bytecode
	}
}

impl fmt::Debug for CompiledUnit {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CompiledUnit")
			.field("hash", &format_args!("{:016x}", self.hash))
			.field("name", &self.name)
			.field("bytecode_len", &self.bytecode.len())
			.finish()
	}
}

/// Parses and lowers `source` without touching any cache.
pub fn compile(source: &[u8], name: &str) -> Result<CompiledUnit> {
	let started = Instant::now();
	let lua = Lua::new_with(StdLib::NONE, LuaOptions::default()).map_err(|err| EvalError::Compile(err.to_string()))?;
	let function = lua
		.load(source)
		.set_name(format!("={name}"))
		.set_mode(ChunkMode::Text)
		.into_function()
		.map_err(|err| syntax_error(&err, source, name))?;
	let bytecode = function.dump(false);
	trace!(name, duration = ?started.elapsed(), "compiled");
	Ok(CompiledUnit {
		hash: xxh3_64(source),
		name: name.to_owned(),
		bytecode,
	})
}

fn syntax_error(err: &mlua::Error, source: &[u8], name: &str) -> EvalError {
	let mlua::Error::SyntaxError { message, .. } = err else {
		return EvalError::Compile(err.to_string());
	};
	let rest = message.strip_prefix(name).unwrap_or(message.as_str());
	let Some(caps) = LINE_PREFIX.captures(rest) else {
		return EvalError::Syntax {
			name: name.to_owned(),
			position: SyntaxPosition { line: 1, column: 1 },
			message: message.clone(),
		};
	};
	let line = caps[1].parse().unwrap_or(1);
	let detail = caps[2].to_owned();
	let column = NEAR_TOKEN
		.captures(&detail)
		.and_then(|near| near.get(1).or_else(|| near.get(2)).and_then(|token| token_column(source, line, token.as_str())))
		.unwrap_or(1);
	EvalError::Syntax {
		name: name.to_owned(),
		position: SyntaxPosition { line, column },
		message: detail,
	}
}

/// 1-based column of `token` on `line`; `<eof>` sits one past the line end.
fn token_column(source: &[u8], line: usize, token: &str) -> Option<usize> {
	let text = String::from_utf8_lossy(source);
	let line_text = text.lines().nth(line.checked_sub(1)?).unwrap_or("");
	if token == "<eof>" {
		return Some(line_text.chars().count() + 1);
	}
	let byte_idx = line_text.find(token)?;
	Some(line_text[..byte_idx].chars().count() + 1)
}

/// Content-addressed cache of [`CompiledUnit`]s.
///
/// Entries are never evicted. Concurrent first compiles of the same source may
/// both run, but only the first inserted unit is kept and handed to everyone.
#[derive(Default)]
pub struct CompileCache {
	units: RwLock<FxHashMap<u64, Arc<CompiledUnit>>>,
}

impl CompileCache {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn find_or_compile(&self, source: &[u8], name: &str) -> Result<Arc<CompiledUnit>> {
		let hash = xxh3_64(source);
		if let Some(unit) = self.units.read().get(&hash) {
			return Ok(Arc::clone(unit));
		}
		let compiled = Arc::new(compile(source, name)?);
		let mut units = self.units.write();
		Ok(Arc::clone(units.entry(hash).or_insert(compiled)))
	}

	pub fn len(&self) -> usize {
		self.units.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl fmt::Debug for CompileCache {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CompileCache").field("len", &self.len()).finish()
	}
}
