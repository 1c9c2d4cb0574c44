use std::rc::Rc;

use lmb_value::Value;
use mlua::{IntoLua, Lua, Table};

use super::Context;

/// `json.encode(value)` and `json.decode(text)`; both return `nil, message`
/// on failure.
pub(super) fn loader(lua: &Lua, ctx: &Rc<Context>) -> mlua::Result<Table> {
	let module = lua.create_table()?;
	let max_depth = ctx.config.max_depth;

	module.set(
		"encode",
		lua.create_function(move |lua, value: mlua::Value| {
			let encoded = Value::from_lua_with_limit(value, max_depth)
				.map_err(|err| err.to_string())
				.and_then(|value| serde_json::to_string(&value).map_err(|err| err.to_string()));
			match encoded {
				Ok(text) => Ok((text.into_lua(lua)?, None)),
				Err(message) => Ok((mlua::Value::Nil, Some(message))),
			}
		})?,
	)?;

	module.set(
		"decode",
		lua.create_function(|lua, text: mlua::String| match serde_json::from_slice::<serde_json::Value>(&text.as_bytes()) {
			Ok(json) => Ok((Value::from(json).into_lua(lua)?, None)),
			Err(err) => Ok((mlua::Value::Nil, Some(err.to_string()))),
		})?,
	)?;

	Ok(module)
}
