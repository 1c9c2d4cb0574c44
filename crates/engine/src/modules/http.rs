//! Blocking HTTP client: `http.get(url, opts?)`, `http.post(url, opts?)` and
//! `http.request(method, url, opts?)`.
//!
//! `opts` may carry `headers` (map), `query` (raw query string) and `body`.
//! Responses are `{ status_code, headers, body, url }`; transport failures
//! return `nil, message`.

use std::rc::Rc;

use lmb_value::{Map, Value};
use mlua::{IntoLua, Lua, Table};
use reqwest::Method;
use reqwest::blocking::Client;
use tracing::debug;

use super::Context;

#[derive(Default)]
struct RequestOptions {
	headers: Map,
	query: Option<String>,
	body: Option<Vec<u8>>,
}

impl RequestOptions {
	fn from_lua(opts: Option<Table>) -> mlua::Result<Self> {
		let Some(opts) = opts else {
			return Ok(Self::default());
		};
		let headers = match opts.get::<Option<Value>>("headers")? {
			Some(Value::Map(map)) => map,
			_ => Map::new(),
		};
		let body = opts.get::<Option<mlua::String>>("body")?.map(|body| body.as_bytes().to_vec());
		Ok(Self {
			headers,
			query: opts.get("query")?,
			body,
		})
	}
}

pub(super) fn loader(lua: &Lua, ctx: &Rc<Context>) -> mlua::Result<Table> {
	let module = lua.create_table()?;

	let get_ctx = Rc::clone(ctx);
	module.set(
		"get",
		lua.create_function(move |lua, (url, opts): (String, Option<Table>)| send(lua, &get_ctx, Method::GET, &url, opts))?,
	)?;

	let post_ctx = Rc::clone(ctx);
	module.set(
		"post",
		lua.create_function(move |lua, (url, opts): (String, Option<Table>)| send(lua, &post_ctx, Method::POST, &url, opts))?,
	)?;

	let request_ctx = Rc::clone(ctx);
	module.set(
		"request",
		lua.create_function(move |lua, (method, url, opts): (String, String, Option<Table>)| {
			match Method::from_bytes(method.to_ascii_uppercase().as_bytes()) {
				Ok(method) => send(lua, &request_ctx, method, &url, opts),
				Err(err) => Ok((mlua::Value::Nil, Some(err.to_string()))),
			}
		})?,
	)?;

	Ok(module)
}

impl Context {
	fn http_client(&self) -> reqwest::Result<&Client> {
		if let Some(client) = self.http_client.get() {
			return Ok(client);
		}
		let client = Client::builder().timeout(self.config.http_timeout).build()?;
		Ok(self.http_client.get_or_init(|| client))
	}
}

fn send(lua: &Lua, ctx: &Context, method: Method, url: &str, opts: Option<Table>) -> mlua::Result<(mlua::Value, Option<String>)> {
	let opts = RequestOptions::from_lua(opts)?;
	match perform(ctx, method, url, opts) {
		Ok(response) => Ok((response.into_lua(lua)?, None)),
		Err(err) => Ok((mlua::Value::Nil, Some(err.to_string()))),
	}
}

fn perform(ctx: &Context, method: Method, url: &str, opts: RequestOptions) -> reqwest::Result<Value> {
	let mut full_url = url.to_owned();
	if let Some(query) = opts.query.filter(|query| !query.is_empty()) {
		full_url.push(if full_url.contains('?') { '&' } else { '?' });
		full_url.push_str(&query);
	}

	let mut request = ctx.http_client()?.request(method.clone(), &full_url);
	for (name, value) in &opts.headers {
		if let Some(text) = value.scalar_text() {
			request = request.header(name.as_str(), text);
		}
	}
	if let Some(body) = opts.body {
		request = request.body(body);
	}

	let response = request.send()?;
	let status = response.status().as_u16();
	let final_url = response.url().to_string();
	let mut headers = Map::new();
	for (name, value) in response.headers() {
		let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
		headers
			.entry(name.as_str().to_owned())
			.and_modify(|existing| {
				if let Value::String(existing) = existing {
					existing.push_str(", ");
					existing.push_str(&value);
				}
			})
			.or_insert_with(|| Value::String(value.clone()));
	}
	let body = response.bytes()?;
	debug!(%method, url = %final_url, status, body_size = body.len(), "http capability request");

	Ok(Value::Map(Map::from([
		("status_code".to_owned(), Value::from(status)),
		("headers".to_owned(), Value::Map(headers)),
		("body".to_owned(), Value::from_bytes(&body)),
		("url".to_owned(), Value::String(final_url)),
	])))
}
