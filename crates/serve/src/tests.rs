use axum::body::{Body, to_bytes};
use axum::http::Request;
use lmb_engine::{EngineConfig, Map, Value};
use lmb_store::Store;
use tower::ServiceExt;

use super::*;

fn app(source: &str) -> Router {
	let store = Arc::new(Store::open_in_memory().expect("in-memory store should open"));
	let engine = Arc::new(Engine::new(store).with_config(EngineConfig::default()));
	let unit = engine.compile(source.as_bytes(), "handler").expect("handler should compile");
	router(AppState::new(engine, unit, Duration::from_secs(5)))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, String) {
	let response = app.oneshot(request).await.expect("router should respond");
	let status = response.status();
	let headers = response.headers().clone();
	let body = to_bytes(response.into_body(), usize::MAX).await.expect("body should be readable");
	(status, headers, String::from_utf8(body.to_vec()).expect("utf-8 body"))
}

fn get(uri: &str) -> Request<Body> {
	Request::builder().uri(uri).body(Body::empty()).expect("request should build")
}

#[tokio::test]
async fn request_metadata_is_seeded() {
	let app = app(
		r#"
		local req = require('@lmb').state.request
		return req.method .. ' ' .. req.path .. '?' .. req.query .. ' ' .. req.body .. ' ' .. table.concat(req.headers['x-multi'], ',')
	"#,
	);
	let request = Request::builder()
		.method("POST")
		.uri("/hello?name=lmb")
		.header("X-Multi", "a")
		.header("x-multi", "b")
		.body(Body::from("payload"))
		.expect("request should build");

	let (status, _, body) = send(app, request).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body, "POST /hello?name=lmb payload a,b");
}

#[tokio::test]
async fn returned_value_becomes_body() {
	let (_, _, body) = send(app("return 1.5"), get("/")).await;
	assert_eq!(body, "1.5");
	let (_, _, body) = send(app("return {a = 1}"), get("/")).await;
	assert_eq!(body, r#"{"a":1}"#);
	let (_, _, body) = send(app("return nil"), get("/")).await;
	assert_eq!(body, "");
}

#[tokio::test]
async fn state_sets_status_and_headers() {
	let app = app(
		r#"
		local state = require('@lmb').state
		state.status_code = 201
		state.headers = { ['content-type'] = 'text/plain', ['x-count'] = 3, ['set-cookie'] = { 'a=1', 'b=2' } }
		return 'created'
	"#,
	);
	let (status, headers, body) = send(app, get("/")).await;
	assert_eq!(status, StatusCode::CREATED);
	assert_eq!(headers.get("content-type").expect("content-type"), "text/plain");
	assert_eq!(headers.get("x-count").expect("x-count"), "3");
	let cookies: Vec<_> = headers.get_all("set-cookie").iter().map(|v| v.to_str().expect("ascii")).collect();
	assert_eq!(cookies, ["a=1", "b=2"]);
	assert_eq!(body, "created");
}

#[tokio::test]
async fn output_wins_over_returned_value() {
	let (_, _, body) = send(app("require('io').write('streamed') return 'ignored'"), get("/")).await;
	assert_eq!(body, "streamed");
}

#[tokio::test]
async fn script_error_is_opaque_500() {
	let (status, _, body) = send(app("error('secret detail')"), get("/")).await;
	assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(body, "");
}

#[tokio::test]
async fn runaway_script_times_out_with_500() {
	let store = Arc::new(Store::open_in_memory().expect("store"));
	let engine = Arc::new(Engine::new(store));
	let unit = engine.compile(b"while true do end", "spin").expect("compile");
	let app = router(AppState::new(engine, unit, Duration::from_millis(10)));
	let (status, _, _) = send(app, get("/")).await;
	assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn status_code_coercion() {
	assert_eq!(response::status_code(None), StatusCode::OK);
	assert_eq!(response::status_code(Some(&Value::Int(404))), StatusCode::NOT_FOUND);
	assert_eq!(response::status_code(Some(&Value::Float(503.0))), StatusCode::SERVICE_UNAVAILABLE);
	assert_eq!(response::status_code(Some(&Value::from("302"))), StatusCode::FOUND);
	assert_eq!(response::status_code(Some(&Value::Int(1000))), StatusCode::OK);
	assert_eq!(response::status_code(Some(&Value::Int(99))), StatusCode::OK);
	assert_eq!(response::status_code(Some(&Value::from("teapot"))), StatusCode::OK);
	assert_eq!(response::status_code(Some(&Value::Bool(true))), StatusCode::OK);
}

#[test]
fn invalid_headers_are_skipped() {
	let headers = Value::Map(Map::from([
		("bad name".to_owned(), Value::from("x")),
		("x-ok".to_owned(), Value::Bool(true)),
		("x-nested".to_owned(), Value::List(vec![Value::Map(Map::new()), Value::from("kept")])),
	]));
	let map = response::header_map(&headers);
	assert_eq!(map.len(), 2);
	assert_eq!(map.get("x-ok").expect("x-ok"), "true");
	assert_eq!(map.get("x-nested").expect("x-nested"), "kept");
	assert!(response::header_map(&Value::from("not a map")).is_empty());
}
