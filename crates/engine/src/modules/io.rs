use std::io::{BufRead, Read, Write};
use std::rc::Rc;

use lmb_value::Value;
use mlua::{ExternalResult, Function, IntoLua, Lua, Table, Variadic};

use super::Context;
use crate::Input;

pub(super) fn loader(lua: &Lua, ctx: &Rc<Context>) -> mlua::Result<Table> {
	let module = lua.create_table()?;

	let input = ctx.input.clone();
	module.set("read", lua.create_function(move |lua, format: Option<mlua::Value>| read(lua, &input, format))?)?;

	let output = Rc::clone(&ctx.output);
	module.set(
		"write",
		lua.create_function(move |lua, args: Variadic<mlua::Value>| {
			let mut output = output.borrow_mut();
			for (idx, arg) in args.iter().enumerate() {
				output.extend_from_slice(&text_arg(lua, arg.clone(), idx + 1, "write")?);
			}
			Ok(())
		})?,
	)?;

	let stderr = lua.create_table()?;
	stderr.set(
		"write",
		lua.create_function(|lua, (_, args): (mlua::Value, Variadic<mlua::Value>)| {
			let mut stderr = std::io::stderr().lock();
			for (idx, arg) in args.iter().enumerate() {
				stderr.write_all(&text_arg(lua, arg.clone(), idx + 1, "write")?).into_lua_err()?;
			}
			stderr.flush().into_lua_err()
		})?,
	)?;
	module.set("stderr", stderr)?;

	Ok(module)
}

/// Global `print` writing to the evaluation's output buffer instead of the
/// host's stdout: `tostring` of each argument, tab separated, newline ended.
pub(super) fn print(lua: &Lua, ctx: &Rc<Context>) -> mlua::Result<Function> {
	let tostring: Function = lua.globals().get("tostring")?;
	let output = Rc::clone(&ctx.output);
	lua.create_function(move |_, args: Variadic<mlua::Value>| {
		let mut line = Vec::new();
		for (idx, arg) in args.iter().enumerate() {
			if idx > 0 {
				line.push(b'\t');
			}
			line.extend_from_slice(&tostring.call::<mlua::String>(arg.clone())?.as_bytes());
		}
		line.push(b'\n');
		output.borrow_mut().extend_from_slice(&line);
		Ok(())
	})
}

/// Strings pass through; numbers use Lua's own formatting.
fn text_arg(lua: &Lua, arg: mlua::Value, position: usize, func: &str) -> mlua::Result<Vec<u8>> {
	match arg {
		mlua::Value::String(text) => Ok(text.as_bytes().to_vec()),
		mlua::Value::Integer(_) | mlua::Value::Number(_) => match lua.coerce_string(arg)? {
			Some(text) => Ok(text.as_bytes().to_vec()),
			None => Err(mlua::Error::runtime(format!("bad argument #{position} to '{func}' (number not printable)"))),
		},
		other => Err(mlua::Error::runtime(format!(
			"bad argument #{position} to '{func}' (string expected, got {})",
			other.type_name()
		))),
	}
}

fn read(lua: &Lua, input: &Input, format: Option<mlua::Value>) -> mlua::Result<mlua::Value> {
	let mut guard = input.lock();
	let reader: &mut dyn BufRead = &mut **guard;
	match format {
		None => read_line(lua, reader, false),
		Some(mlua::Value::Integer(count)) => read_bytes(lua, reader, count),
		Some(mlua::Value::Number(count)) => read_bytes(lua, reader, count as i64),
		Some(mlua::Value::String(format)) => {
			let format = format.to_str()?;
			let format: &str = &format;
			match format.strip_prefix('*').unwrap_or(format) {
				"a" => read_all(lua, reader),
				"n" => read_number(reader),
				"l" => read_line(lua, reader, false),
				"L" => read_line(lua, reader, true),
				other => Err(mlua::Error::runtime(format!("bad argument #1 to 'read' (invalid format '{other}')"))),
			}
		}
		Some(other) => Err(mlua::Error::runtime(format!(
			"bad argument #1 to 'read' (unsupported format of type {})",
			other.type_name()
		))),
	}
}

/// Up to `count` bytes; text when valid UTF-8, otherwise a list of bytes.
fn read_bytes(lua: &Lua, reader: &mut dyn BufRead, count: i64) -> mlua::Result<mlua::Value> {
	let count = u64::try_from(count).map_err(|_| mlua::Error::runtime("bad argument #1 to 'read' (negative byte count)"))?;
	let mut buf = Vec::new();
	let read = Read::take(reader, count).read_to_end(&mut buf).into_lua_err()?;
	if read == 0 && count > 0 {
		return Ok(mlua::Value::Nil);
	}
	Value::from_bytes(&buf).into_lua(lua)
}

fn read_all(lua: &Lua, reader: &mut dyn BufRead) -> mlua::Result<mlua::Value> {
	let mut buf = Vec::new();
	reader.read_to_end(&mut buf).into_lua_err()?;
	if buf.is_empty() {
		return Ok(mlua::Value::Nil);
	}
	lua.create_string(&buf).map(mlua::Value::String)
}

fn read_line(lua: &Lua, reader: &mut dyn BufRead, keep_newline: bool) -> mlua::Result<mlua::Value> {
	let mut buf = Vec::new();
	if reader.read_until(b'\n', &mut buf).into_lua_err()? == 0 {
		return Ok(mlua::Value::Nil);
	}
	if !keep_newline && buf.last() == Some(&b'\n') {
		buf.pop();
	}
	lua.create_string(&buf).map(mlua::Value::String)
}

fn read_number(reader: &mut dyn BufRead) -> mlua::Result<mlua::Value> {
	let mut line = String::new();
	if reader.read_line(&mut line).into_lua_err()? == 0 {
		return Ok(mlua::Value::Nil);
	}
	let text = line.trim();
	if let Ok(int) = text.parse::<i64>() {
		return Ok(mlua::Value::Integer(int));
	}
	text.parse::<f64>()
		.map(mlua::Value::Number)
		.map_err(|_| mlua::Error::runtime(format!("invalid number: {text:?}")))
}
