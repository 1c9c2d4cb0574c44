//! Lua <-> [`Value`] bridge.
//!
//! Tables with a contiguous run of positive integer keys starting at `1`
//! become [`Value::List`] sized by that run; any other table becomes a
//! [`Value::Map`] with stringified keys. Non-data values (functions, threads,
//! userdata) become their `"<type>: <address>"` text.

use mlua::{FromLua, IntoLua, Lua};

use crate::{ConversionError, Map, Value};

/// Default bound on table nesting when converting out of Lua.
pub const MAX_DEPTH: usize = 64;

impl Value {
	/// Converts a Lua value, failing once tables nest deeper than `max_depth`.
	pub fn from_lua_with_limit(value: mlua::Value, max_depth: usize) -> mlua::Result<Self> {
		convert(value, 0, max_depth)
	}
}

fn convert(value: mlua::Value, depth: usize, max_depth: usize) -> mlua::Result<Value> {
	Ok(match value {
		mlua::Value::Nil => Value::Nothing,
		mlua::Value::Boolean(val) => Value::Bool(val),
		mlua::Value::Integer(val) => Value::Int(val),
		mlua::Value::Number(val) => Value::Float(val),
		mlua::Value::String(val) => Value::from_bytes(&val.as_bytes()),
		mlua::Value::Table(table) => {
			if depth >= max_depth {
				return Err(mlua::Error::external(ConversionError::TooDeep(max_depth)));
			}
			let len = contiguous_len(&table)?;
			if len > 0 {
				let mut items = Vec::with_capacity(len);
				for idx in 1..=len {
					let item = table.raw_get::<mlua::Value>(idx)?;
					items.push(convert(item, depth + 1, max_depth)?);
				}
				Value::List(items)
			} else {
				let mut map = Map::new();
				for pair in table.pairs::<mlua::Value, mlua::Value>() {
					let (key, item) = pair?;
					map.insert(key_text(&key), convert(item, depth + 1, max_depth)?);
				}
				Value::Map(map)
			}
		}
		other => Value::String(opaque_text(&other)),
	})
}

/// Length of the run of non-nil entries at `1..`.
fn contiguous_len(table: &mlua::Table) -> mlua::Result<usize> {
	let mut len = 0;
	while !table.raw_get::<mlua::Value>(len + 1)?.is_nil() {
		len += 1;
	}
	Ok(len)
}

fn key_text(key: &mlua::Value) -> String {
	match key {
		mlua::Value::Integer(val) => val.to_string(),
		mlua::Value::Number(val) => val.to_string(),
		mlua::Value::Boolean(val) => val.to_string(),
		mlua::Value::String(val) => val.to_string_lossy().to_string(),
		other => opaque_text(other),
	}
}

fn opaque_text(value: &mlua::Value) -> String {
	format!("{}: {:p}", value.type_name(), value.to_pointer())
}

impl FromLua for Value {
	fn from_lua(value: mlua::Value, _lua: &Lua) -> mlua::Result<Self> {
		convert(value, 0, MAX_DEPTH)
	}
}

impl IntoLua for Value {
	fn into_lua(self, lua: &Lua) -> mlua::Result<mlua::Value> {
		Ok(match self {
			Self::Nothing => mlua::Value::Nil,
			Self::Bool(val) => mlua::Value::Boolean(val),
			Self::Int(val) => mlua::Value::Integer(val),
			Self::Float(val) => mlua::Value::Number(val),
			Self::String(val) => mlua::Value::String(lua.create_string(&val)?),
			Self::List(items) => mlua::Value::Table(lua.create_sequence_from(items)?),
			Self::Map(map) => mlua::Value::Table(lua.create_table_from(map)?),
		})
	}
}
