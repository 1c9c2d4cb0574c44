//! Regular expressions with `string`-library shaped calls, subject first:
//! `re.find(s, pattern, init?)`, `re.match(s, pattern)`,
//! `re.gsub(s, pattern, replacement)`, `re.split(s, pattern)`, `re.quote(s)`.

use std::rc::Rc;

use mlua::{ExternalResult, IntoLua, Lua, MultiValue, Table};
use regex::Regex;

use super::Context;

pub(super) fn loader(lua: &Lua, _ctx: &Rc<Context>) -> mlua::Result<Table> {
	let module = lua.create_table()?;

	module.set(
		"find",
		lua.create_function(|lua, (subject, pattern, init): (String, String, Option<i64>)| {
			let re = Regex::new(&pattern).into_lua_err()?;
			let start = start_offset(&subject, init);
			let Some(caps) = re.captures_at(&subject, start) else {
				return Ok(MultiValue::from_iter([mlua::Value::Nil]));
			};
			let Some(whole) = caps.get(0) else {
				return Ok(MultiValue::from_iter([mlua::Value::Nil]));
			};
			let mut out = vec![mlua::Value::Integer(whole.start() as i64 + 1), mlua::Value::Integer(whole.end() as i64)];
			for group in caps.iter().skip(1) {
				out.push(group.map(|m| m.as_str()).into_lua(lua)?);
			}
			Ok(MultiValue::from_iter(out))
		})?,
	)?;

	module.set(
		"match",
		lua.create_function(|lua, (subject, pattern): (String, String)| {
			let re = Regex::new(&pattern).into_lua_err()?;
			let Some(caps) = re.captures(&subject) else {
				return Ok(MultiValue::from_iter([mlua::Value::Nil]));
			};
			if caps.len() == 1 {
				return Ok(MultiValue::from_iter([caps.get(0).map(|m| m.as_str()).into_lua(lua)?]));
			}
			caps.iter().skip(1).map(|group| group.map(|m| m.as_str()).into_lua(lua)).collect()
		})?,
	)?;

	module.set(
		"gsub",
		lua.create_function(|_, (subject, pattern, replacement): (String, String, String)| {
			let re = Regex::new(&pattern).into_lua_err()?;
			let count = re.find_iter(&subject).count();
			Ok((re.replace_all(&subject, replacement.as_str()).into_owned(), count))
		})?,
	)?;

	module.set(
		"split",
		lua.create_function(|_, (subject, pattern): (String, String)| {
			let re = Regex::new(&pattern).into_lua_err()?;
			Ok(re.split(&subject).map(str::to_owned).collect::<Vec<_>>())
		})?,
	)?;

	module.set("quote", lua.create_function(|_, text: String| Ok(regex::escape(&text)))?)?;

	Ok(module)
}

/// Byte offset for a 1-based, possibly negative `init`, snapped forward to a
/// char boundary.
fn start_offset(subject: &str, init: Option<i64>) -> usize {
	let len = subject.len() as i64;
	let offset = match init.unwrap_or(1) {
		0 => 0,
		idx if idx > 0 => (idx - 1).min(len),
		idx => (len + idx).max(0),
	} as usize;
	(offset..=subject.len()).find(|&idx| subject.is_char_boundary(idx)).unwrap_or(subject.len())
}
