use axum::body::Bytes;
use axum::http::{HeaderMap, Method, Uri};
use lmb_engine::{EvaluationState, Map, Value};

/// Seeds `state.request` with `headers` (lowercase name -> list of values),
/// `method`, `path`, `query` and `body`.
pub(crate) fn seed_state(method: &Method, uri: &Uri, headers: &HeaderMap, body: &Bytes) -> EvaluationState {
	let mut header_values = Map::new();
	for (name, value) in headers {
		let text = Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned());
		match header_values.entry(name.as_str().to_ascii_lowercase()).or_insert_with(|| Value::List(Vec::new())) {
			Value::List(values) => values.push(text),
			other => *other = Value::List(vec![text]),
		}
	}

	let request = Map::from([
		("headers".to_owned(), Value::Map(header_values)),
		("method".to_owned(), Value::from(method.as_str())),
		("path".to_owned(), Value::from(uri.path())),
		("query".to_owned(), Value::from(uri.query().unwrap_or_default())),
		("body".to_owned(), Value::from_bytes(body)),
	]);

	let mut state = EvaluationState::new();
	state.set("request", Value::Map(request));
	state
}
