//! Per-evaluation interpreter construction and execution.

use std::cell::{Cell, RefCell};
use std::io::Write;
use std::mem;
use std::rc::Rc;
use std::time::Instant;

use lmb_value::Value;
use mlua::{ChunkMode, HookTriggers, Lua, LuaOptions, MultiValue, StdLib, VmState};
use tracing::{debug, warn};

use crate::deadline::{Abort, Deadline};
use crate::error::{EvalError, Result};
use crate::modules::{self, Context};
use crate::{CompiledUnit, Engine, EvaluationState};

/// Base library is always present; everything else must be listed here.
fn libs() -> StdLib {
	StdLib::PACKAGE | StdLib::MATH | StdLib::STRING | StdLib::TABLE
}

/// Strips file access and native loading, and limits `require` to preloaded
/// capability modules.
const PRELUDE: &str = r#"
local raw_load = load
dofile, loadfile = nil, nil
_G.load = function(chunk, chunkname, _, ...)
	return raw_load(chunk, chunkname, "t", ...)
end
package.path = ""
package.cpath = ""
package.loadlib = nil
package.searchers = { package.searchers[1] }
"#;

pub(crate) fn run(engine: &Engine, unit: &CompiledUnit, state: &mut EvaluationState, deadline: Deadline, output: Option<&mut dyn Write>) -> Result<Value> {
	deadline.check()?;
	let started = Instant::now();

	// SAFETY: binary chunks are only ever loaded from `CompiledUnit`s this
	// crate produced; the prelude forces text mode for script-level `load`.
	let lua = unsafe { Lua::unsafe_new_with(libs(), LuaOptions::new()) };
	lua.load(PRELUDE).set_name("=prelude").exec().map_err(|err| EvalError::Compile(err.to_string()))?;

	let shared_state = Rc::new(RefCell::new(mem::take(state)));
	let buffer = Rc::new(RefCell::new(Vec::new()));
	let ctx = Rc::new(Context::new(engine, Rc::clone(&shared_state), Rc::clone(&buffer)));

	let outcome = execute(&lua, unit, &ctx, &deadline, engine.config().hook_interval);
	drop(ctx);
	drop(lua);
	*state = shared_state.take();

	let written = mem::take(&mut *buffer.borrow_mut());
	if let Some(sink) = output
		&& !written.is_empty()
	{
		sink.write_all(&written)?;
		sink.flush()?;
	}

	match &outcome {
		Ok(_) => debug!(name = unit.name(), duration = ?started.elapsed(), output_bytes = written.len(), "evaluated"),
		Err(err) => warn!(name = unit.name(), duration = ?started.elapsed(), error = %err, "evaluation failed"),
	}
	outcome
}

fn execute(lua: &Lua, unit: &CompiledUnit, ctx: &Rc<Context>, deadline: &Deadline, hook_interval: u32) -> Result<Value> {
	modules::register(lua, ctx).map_err(|err| EvalError::Compile(err.to_string()))?;

	let aborted = Rc::new(Cell::new(None::<Abort>));
	install_hook(lua, hook_interval.max(1), deadline.clone(), Rc::clone(&aborted));

	let called = lua
		.load(unit.bytecode())
		.set_name(format!("={}", unit.name()))
		.set_mode(ChunkMode::Binary)
		.call::<MultiValue>(());
	if let Some(abort) = aborted.get() {
		return Err(abort.into());
	}
	let values = called.map_err(|err| EvalError::from_lua(&err))?;
	match values.into_iter().last() {
		Some(last) => Value::from_lua_with_limit(last, ctx.config.max_depth).map_err(|err| EvalError::from_lua(&err)),
		None => Ok(Value::Nothing),
	}
}

/// Checks `deadline` every `interval` instructions. Once it fires, the hook is
/// reinstalled to raise on every instruction, so a script that catches the
/// error with `pcall` cannot execute anything afterwards.
fn install_hook(lua: &Lua, interval: u32, deadline: Deadline, aborted: Rc<Cell<Option<Abort>>>) {
	lua.set_hook(HookTriggers::new().every_nth_instruction(interval), move |lua, _| {
		if let Some(abort) = aborted.get() {
			return Err(mlua::Error::runtime(abort.message()));
		}
		match deadline.check() {
			Ok(()) => Ok(VmState::Continue),
			Err(abort) => {
				aborted.set(Some(abort));
				install_hook(lua, 1, deadline.clone(), Rc::clone(&aborted));
				Err(mlua::Error::runtime(abort.message()))
			}
		}
	});
}
