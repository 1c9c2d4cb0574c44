use std::rc::Rc;

use lmb_value::Value;
use mlua::{Lua, Table};
use tracing::{Level, debug, error, info, trace, warn};

use super::Context;

const LEVELS: [(&str, Level); 5] = [
	("trace", Level::TRACE),
	("debug", Level::DEBUG),
	("info", Level::INFO),
	("warn", Level::WARN),
	("error", Level::ERROR),
];

/// `logger.<level>(message, fields?)`, forwarded to `tracing` under the
/// `lmb::script` target.
pub(super) fn loader(lua: &Lua, _ctx: &Rc<Context>) -> mlua::Result<Table> {
	let module = lua.create_table()?;
	for (name, level) in LEVELS {
		module.set(
			name,
			lua.create_function(move |_, (message, fields): (Value, Option<Value>)| {
				emit(level, &message.to_string(), fields.filter(|fields| !fields.is_nothing()).map(|fields| fields.to_string()));
				Ok(())
			})?,
		)?;
	}
	Ok(module)
}

fn emit(level: Level, message: &str, fields: Option<String>) {
	let fields = fields.as_deref();
	match level {
		Level::TRACE => trace!(target: "lmb::script", fields, "{message}"),
		Level::DEBUG => debug!(target: "lmb::script", fields, "{message}"),
		Level::INFO => info!(target: "lmb::script", fields, "{message}"),
		Level::WARN => warn!(target: "lmb::script", fields, "{message}"),
		_ => error!(target: "lmb::script", fields, "{message}"),
	}
}
