use std::rc::Rc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use mlua::{IntoLua, Lua, Table};
use sha2::{Digest, Sha256, Sha512};

use super::Context;

/// Digests return lowercase hex; decoders return `nil, message` on bad input.
pub(super) fn loader(lua: &Lua, _ctx: &Rc<Context>) -> mlua::Result<Table> {
	let module = lua.create_table()?;

	module.set(
		"sha256",
		lua.create_function(|_, data: mlua::String| Ok(hex::encode(Sha256::digest(&*data.as_bytes()))))?,
	)?;
	module.set(
		"sha512",
		lua.create_function(|_, data: mlua::String| Ok(hex::encode(Sha512::digest(&*data.as_bytes()))))?,
	)?;
	module.set("base64_encode", lua.create_function(|_, data: mlua::String| Ok(STANDARD.encode(&*data.as_bytes())))?)?;
	module.set(
		"base64_decode",
		lua.create_function(|lua, data: mlua::String| decoded(lua, STANDARD.decode(&*data.as_bytes()).map_err(|err| err.to_string())))?,
	)?;
	module.set("hex_encode", lua.create_function(|_, data: mlua::String| Ok(hex::encode(&*data.as_bytes())))?)?;
	module.set(
		"hex_decode",
		lua.create_function(|lua, data: mlua::String| decoded(lua, hex::decode(&*data.as_bytes()).map_err(|err| err.to_string())))?,
	)?;

	Ok(module)
}

fn decoded(lua: &Lua, result: Result<Vec<u8>, String>) -> mlua::Result<(mlua::Value, Option<String>)> {
	match result {
		Ok(bytes) => Ok((lua.create_string(bytes)?.into_lua(lua)?, None)),
		Err(message) => Ok((mlua::Value::Nil, Some(message))),
	}
}
