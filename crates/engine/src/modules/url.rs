use std::rc::Rc;

use lmb_value::Value;
use mlua::{IntoLua, Lua, Table};
use url::Url;
use url::form_urlencoded;

use super::Context;

pub(super) fn loader(lua: &Lua, ctx: &Rc<Context>) -> mlua::Result<Table> {
	let module = lua.create_table()?;

	module.set(
		"parse",
		lua.create_function(|lua, raw: String| match Url::parse(&raw) {
			Ok(parsed) => Ok((url_table(lua, &parsed)?, None)),
			Err(err) => Ok((mlua::Value::Nil, Some(err.to_string()))),
		})?,
	)?;

	module.set(
		"resolve",
		lua.create_function(|lua, (base, reference): (String, String)| match Url::parse(&base).and_then(|base| base.join(&reference)) {
			Ok(resolved) => Ok((String::from(resolved).into_lua(lua)?, None)),
			Err(err) => Ok((mlua::Value::Nil, Some(err.to_string()))),
		})?,
	)?;

	let max_depth = ctx.config.max_depth;
	module.set(
		"build_query_string",
		lua.create_function(move |_, params: mlua::Value| Ok(query_string(&Value::from_lua_with_limit(params, max_depth)?)))?,
	)?;

	Ok(module)
}

fn url_table(lua: &Lua, parsed: &Url) -> mlua::Result<mlua::Value> {
	let table = lua.create_table()?;
	table.set("scheme", parsed.scheme())?;
	table.set("username", parsed.username())?;
	table.set("password", parsed.password())?;
	table.set("host", parsed.host_str())?;
	table.set("port", parsed.port_or_known_default())?;
	table.set("path", parsed.path())?;
	table.set("query", parsed.query())?;
	table.set("fragment", parsed.fragment())?;
	Ok(mlua::Value::Table(table))
}

/// Encodes a map as `application/x-www-form-urlencoded`. List values repeat
/// the key; containers nested deeper than that are skipped.
fn query_string(params: &Value) -> String {
	let mut serializer = form_urlencoded::Serializer::new(String::new());
	if let Value::Map(map) = params {
		for (key, value) in map {
			match value {
				Value::List(items) => {
					for text in items.iter().filter_map(Value::scalar_text) {
						serializer.append_pair(key, &text);
					}
				}
				other => {
					if let Some(text) = other.scalar_text() {
						serializer.append_pair(key, &text);
					}
				}
			}
		}
	}
	serializer.finish()
}
