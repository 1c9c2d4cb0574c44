//! `require('@lmb')`: the `state` and `store` capability objects.

use std::rc::Rc;

use lmb_store::{Store, Transaction};
use lmb_value::Value;
use mlua::{ExternalResult, Function, IntoLua, Lua, MultiValue, Table};
use tracing::warn;

use super::Context;

pub(super) fn loader(lua: &Lua, ctx: &Rc<Context>) -> mlua::Result<Table> {
	let module = lua.create_table()?;
	module.set("state", state_object(lua, ctx)?)?;
	module.set("store", store_object(lua, ctx)?)?;
	Ok(module)
}

/// Proxy table over the evaluation's [`EvaluationState`](crate::EvaluationState).
fn state_object(lua: &Lua, ctx: &Rc<Context>) -> mlua::Result<Table> {
	let state = Rc::clone(&ctx.state);
	let get = lua.create_function(move |lua, (_, key): (Table, String)| {
		let value = state.borrow().get(&key).cloned();
		value.unwrap_or_default().into_lua(lua)
	})?;

	let state = Rc::clone(&ctx.state);
	let max_depth = ctx.config.max_depth;
	let set = lua.create_function(move |_, (_, key, value): (Table, String, mlua::Value)| {
		let value = Value::from_lua_with_limit(value, max_depth)?;
		let mut state = state.borrow_mut();
		if value.is_nothing() {
			state.remove(&key);
		} else {
			state.set(key, value);
		}
		Ok(())
	})?;

	capability_object(lua, get, set, None)
}

/// Proxy table over the shared [`Store`], plus `store:update(fn)`.
fn store_object(lua: &Lua, ctx: &Rc<Context>) -> mlua::Result<Table> {
	let max_depth = ctx.config.max_depth;

	let store = ctx.store.clone();
	let get = lua.create_function(move |lua, (_, key): (Table, String)| store.get(&key).into_lua_err()?.unwrap_or_default().into_lua(lua))?;

	let store = ctx.store.clone();
	let set = lua.create_function(move |_, (_, key, value): (Table, String, mlua::Value)| {
		let value = Value::from_lua_with_limit(value, max_depth)?;
		store.put(&key, &value).into_lua_err()
	})?;

	let store = ctx.store.clone();
	let update = lua.create_function(move |lua, (_, f): (Table, Function)| update(lua, &store, &f, max_depth))?;
	capability_object(lua, get, set, Some(update))
}

/// Table with `get`/`set` (and optionally `update`) methods whose metatable
/// routes plain indexing through the same functions. Keys named like a method
/// are only reachable through `get`/`set`.
fn capability_object(lua: &Lua, get: Function, set: Function, update: Option<Function>) -> mlua::Result<Table> {
	let meta = lua.create_table()?;
	meta.set("__index", get.clone())?;
	meta.set("__newindex", set.clone())?;

	let object = lua.create_table()?;
	object.raw_set("get", get)?;
	object.raw_set("set", set)?;
	if let Some(update) = update {
		object.raw_set("update", update)?;
	}
	object.set_metatable(Some(meta));
	Ok(object)
}

/// Runs `f(tx)` in a store transaction. A raised error rolls back and
/// propagates; a normal return commits and forwards `f`'s results.
fn update(lua: &Lua, store: &Store, f: &Function, max_depth: usize) -> mlua::Result<MultiValue> {
	let tx = store.begin().into_lua_err()?;
	let called = lua.scope(|scope| {
		let get = scope.create_function(|lua, (_, key): (Table, String)| tx.get(&key).into_lua_err()?.unwrap_or_default().into_lua(lua))?;
		let set = scope.create_function(|_, (_, key, value): (Table, String, mlua::Value)| {
			let value = Value::from_lua_with_limit(value, max_depth)?;
			tx.put(&key, &value).into_lua_err()
		})?;
		f.call::<MultiValue>(capability_object(lua, get, set, None)?)
	});
	finish(tx, called)
}

fn finish(tx: Transaction<'_>, called: mlua::Result<MultiValue>) -> mlua::Result<MultiValue> {
	match called {
		Ok(values) => {
			tx.commit().into_lua_err()?;
			if values.is_empty() {
				return Ok(MultiValue::from_iter([mlua::Value::Nil]));
			}
			Ok(values)
		}
		Err(err) => {
			if let Err(rollback) = tx.rollback() {
				warn!(error = %rollback, "store rollback failed");
			}
			Err(err)
		}
	}
}
