//! Capability modules exposed to scripts through `require(name)`.
//!
//! Every module is registered as a `package.preload` loader closing over the
//! evaluation's [`Context`], so nothing is built unless the script asks for it.

mod crypto;
mod http;
mod io;
mod json;
mod lmb;
mod logger;
mod re;
mod url;

use std::cell::{OnceCell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use lmb_store::Store;
use mlua::{Lua, MultiValue, Table};

use crate::{Engine, EngineConfig, EvaluationState, Input};

/// Collaborators shared by the modules of one evaluation.
pub(crate) struct Context {
	pub(crate) store: Arc<Store>,
	pub(crate) input: Input,
	pub(crate) state: Rc<RefCell<EvaluationState>>,
	pub(crate) output: Rc<RefCell<Vec<u8>>>,
	pub(crate) config: EngineConfig,
	http_client: OnceCell<reqwest::blocking::Client>,
}

impl Context {
	pub(crate) fn new(engine: &Engine, state: Rc<RefCell<EvaluationState>>, output: Rc<RefCell<Vec<u8>>>) -> Self {
		Self {
			store: Arc::clone(engine.store()),
			input: engine.input().clone(),
			state,
			output,
			config: engine.config().clone(),
			http_client: OnceCell::new(),
		}
	}
}

type Loader = fn(&Lua, &Rc<Context>) -> mlua::Result<Table>;

const MODULES: &[(&str, Loader)] = &[
	("io", io::loader),
	("@lmb", lmb::loader),
	("json", json::loader),
	("logger", logger::loader),
	("re", re::loader),
	("url", url::loader),
	("crypto", crypto::loader),
	("http", http::loader),
];

pub(crate) fn register(lua: &Lua, ctx: &Rc<Context>) -> mlua::Result<()> {
	let preload = lua.globals().get::<Table>("package")?.get::<Table>("preload")?;
	for &(name, loader) in MODULES {
		let ctx = Rc::clone(ctx);
		preload.set(name, lua.create_function(move |lua, _: MultiValue| loader(lua, &ctx))?)?;
	}
	lua.globals().set("print", io::print(lua, ctx)?)?;
	Ok(())
}
