use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use lmb_engine::{EvalOutcome, Value};
use tracing::warn;

/// Builds the response from what the script left behind: `state.status_code`,
/// `state.headers`, and either the buffered output or the returned value.
/// Also returns the body length.
pub(crate) fn project(outcome: EvalOutcome) -> (Response, usize) {
	let status = status_code(outcome.state.get("status_code"));
	let headers = outcome.state.get("headers").map(header_map).unwrap_or_default();

	let body = if outcome.output.is_empty() {
		outcome.value.to_string().into_bytes()
	} else {
		if !outcome.value.is_nothing() {
			warn!("script wrote output and returned a value; the value is ignored");
		}
		outcome.output
	};

	let size = body.len();
	((status, headers, Body::from(body)).into_response(), size)
}

/// Integer, float or numeric text; anything outside 100..=599 means 200.
pub(crate) fn status_code(value: Option<&Value>) -> StatusCode {
	let code = match value {
		Some(Value::Int(code)) => Some(*code),
		Some(Value::Float(code)) if code.is_finite() => Some(*code as i64),
		Some(Value::String(code)) => code.trim().parse::<i64>().ok(),
		_ => None,
	};
	code.filter(|code| (100..=599).contains(code))
		.and_then(|code| u16::try_from(code).ok())
		.and_then(|code| StatusCode::from_u16(code).ok())
		.unwrap_or(StatusCode::OK)
}

/// Scalars become one header line each; lists repeat the header.
pub(crate) fn header_map(value: &Value) -> HeaderMap {
	let mut headers = HeaderMap::new();
	let Value::Map(entries) = value else {
		warn!(kind = %value.get_type(), "state.headers is not a map; ignoring");
		return headers;
	};
	for (name, value) in entries {
		let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
			warn!(name, "invalid response header name; skipping");
			continue;
		};
		let values = match value {
			Value::List(items) => items.iter().collect::<Vec<_>>(),
			scalar => vec![scalar],
		};
		for item in values {
			let Some(text) = item.scalar_text() else {
				warn!(name, kind = %item.get_type(), "unsupported response header value; skipping");
				continue;
			};
			match HeaderValue::from_str(&text) {
				Ok(header_value) => {
					headers.append(header_name.clone(), header_value);
				}
				Err(_) => warn!(name, "invalid response header value; skipping"),
			}
		}
	}
	headers
}
