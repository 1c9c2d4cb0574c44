use std::sync::Arc;
use std::time::{Duration, Instant};

use lmb_store::Store;
use tokio_util::sync::CancellationToken;

use super::*;

fn engine() -> Engine {
	Engine::new(Arc::new(Store::open_in_memory().expect("in-memory store should open")))
}

fn eval_with(engine: &Engine, source: &str, state: &mut EvaluationState) -> Result<Value> {
	let unit = engine.compile(source.as_bytes(), "test").expect("source should compile");
	engine.eval(&unit, state, Deadline::after(Duration::from_secs(5)), None)
}

fn eval(source: &str) -> Result<Value> {
	eval_with(&engine(), source, &mut EvaluationState::new())
}

#[test]
fn same_source_reuses_compiled_unit() {
	let engine = engine();
	let first = engine.compile(b"return 1", "a").expect("compile");
	let second = engine.compile(b"return 1", "b").expect("compile");
	let other = engine.compile(b"return 2", "c").expect("compile");

	assert!(Arc::ptr_eq(&first, &second));
	assert!(!Arc::ptr_eq(&first, &other));
	assert_ne!(first.hash(), other.hash());
	assert_eq!(engine.cache().len(), 2);
}

#[test]
fn concurrent_first_compiles_agree_on_one_unit() {
	let engine = engine();
	let units: Vec<_> = std::thread::scope(|scope| {
		let handles: Vec<_> = (0..16)
			.map(|_| scope.spawn(|| engine.compile(b"return 'race'", "race").expect("compile should succeed")))
			.collect();
		handles.into_iter().map(|handle| handle.join().expect("thread should not panic")).collect()
	});

	assert!(units.iter().all(|unit| Arc::ptr_eq(unit, &units[0])));
	assert_eq!(engine.cache().len(), 1);
}

#[test]
fn eval_returns_bridged_values() {
	assert_eq!(eval("return 1").expect("eval"), Value::Int(1));
	assert_eq!(eval("return true").expect("eval"), Value::Bool(true));
	assert_eq!(eval("return 'hello'").expect("eval"), Value::from("hello"));
	assert_eq!(eval("return {1, 2}").expect("eval"), Value::from(vec![1, 2]));
	let map = eval("return {a = 1, b = 2}").expect("eval");
	assert_eq!(map.get("a"), Some(&Value::Int(1)));
	assert_eq!(map.get("b"), Some(&Value::Int(2)));
	assert_eq!(eval("").expect("empty source should evaluate"), Value::Nothing);
}

#[test]
fn eval_takes_last_of_multiple_returns() {
	assert_eq!(eval("return 1, 2, 3").expect("eval"), Value::Int(3));
}

#[test]
fn infinite_loop_hits_deadline() {
	let engine = engine();
	let unit = engine.compile(b"while true do end", "spin").expect("compile");
	let started = Instant::now();
	let err = engine
		.eval(&unit, &mut EvaluationState::new(), Deadline::after(Duration::from_millis(1)), None)
		.expect_err("loop should be aborted");

	assert!(matches!(err, EvalError::DeadlineExceeded), "got: {err}");
	assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
	assert_eq!(err.to_string(), "deadline exceeded");
	assert!(started.elapsed() < Duration::from_secs(1), "took {:?}", started.elapsed());
}

#[test]
fn pcall_cannot_swallow_deadline() {
	let engine = engine();
	let unit = engine
		.compile(b"local ok = pcall(function() while true do end end) return ok", "swallow")
		.expect("compile");
	let err = engine
		.eval(&unit, &mut EvaluationState::new(), Deadline::after(Duration::from_millis(5)), None)
		.expect_err("deadline should still surface");
	assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
}

#[test]
fn pcall_in_a_loop_cannot_outlive_deadline() {
	let (done_tx, done_rx) = std::sync::mpsc::channel();
	std::thread::spawn(move || {
		let engine = engine();
		let unit = engine
			.compile(b"local f = function() while true do end end while true do pcall(f) end", "retry")
			.expect("compile");
		let result = engine.eval(&unit, &mut EvaluationState::new(), Deadline::after(Duration::from_millis(5)), None);
		let _ = done_tx.send(result.map_err(|err| err.kind()));
	});

	let result = done_rx.recv_timeout(Duration::from_secs(5)).expect("evaluation should stop soon after its deadline");
	assert_eq!(result, Err(ErrorKind::DeadlineExceeded));
}

#[test]
fn deadline_inside_store_update_releases_store() {
	let engine = engine();
	let unit = engine
		.compile(
			b"require('@lmb').store:update(function(tx) tx.x = 1 while true do pcall(function() while true do end end) end end)",
			"stuck",
		)
		.expect("compile");
	let err = engine
		.eval(&unit, &mut EvaluationState::new(), Deadline::after(Duration::from_millis(5)), None)
		.expect_err("deadline should abort the update");
	assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
	assert_eq!(engine.store().get("x").expect("store should be usable again"), None);
}

#[test]
fn cancelled_token_stops_evaluation() {
	let engine = engine();
	let unit = engine.compile(b"while true do end", "spin").expect("compile");
	let token = CancellationToken::new();
	token.cancel();
	let err = engine
		.eval(&unit, &mut EvaluationState::new(), Deadline::none().with_token(token), None)
		.expect_err("cancelled evaluation should fail");
	assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[test]
fn syntax_error_reports_position() {
	let err = compile(b"ret 1", "broken").expect_err("invalid source should fail");
	let EvalError::Syntax { position, .. } = &err else {
		panic!("expected syntax error, got {err}");
	};
	assert_eq!(*position, SyntaxPosition { line: 1, column: 5 });
	assert!(err.to_string().contains("line:1(column:5)"), "got: {err}");
	assert_eq!(err.kind(), ErrorKind::Syntax);
}

#[test]
fn syntax_error_at_eof_points_past_line_end() {
	let err = compile(b"local x = 1\nif x then", "eof").expect_err("unterminated block should fail");
	let EvalError::Syntax { position, .. } = err else {
		panic!("expected syntax error");
	};
	assert_eq!(position, SyntaxPosition { line: 2, column: 10 });
}

#[test]
fn syntax_position_survives_truncated_chunk_name() {
	let name = "/srv/scripts/tenants/acme/handlers/very/deeply/nested/path/hand.lua";
	assert!(name.len() > 60);
	let err = compile(b"local x = 1\nret 1", name).expect_err("invalid source should fail");
	let EvalError::Syntax { name: reported, position, message } = err else {
		panic!("expected syntax error");
	};
	assert_eq!(reported, name);
	assert_eq!(position, SyntaxPosition { line: 2, column: 5 });
	assert!(message.starts_with("syntax error"), "{message}");
}

#[test]
fn runtime_error_is_captured() {
	let err = eval("error('boom')").expect_err("error should propagate");
	assert_eq!(err.kind(), ErrorKind::Runtime);
	assert!(err.to_string().contains("boom"), "got: {err}");
}

#[test]
fn state_is_seeded_and_written_back() {
	let engine = engine();
	let mut state: EvaluationState = [("name".to_owned(), Value::from("lmb"))].into_iter().collect();
	let source = r#"
		local m = require('@lmb')
		m.state.greeting = 'hello, ' .. m.state.name
		m.state.name = nil
		return m.state.missing
	"#;

	assert_eq!(eval_with(&engine, source, &mut state).expect("eval"), Value::Nothing);
	assert_eq!(state.get("greeting"), Some(&Value::from("hello, lmb")));
	assert_eq!(state.get("name"), None);
	assert_eq!(state.len(), 1);
}

#[test]
fn state_survives_failed_evaluation() {
	let engine = engine();
	let mut state = EvaluationState::from(Map::new());
	assert!(state.is_empty());
	let source = "require('@lmb').state.partial = true error('late failure')";
	eval_with(&engine, source, &mut state).expect_err("script should fail");
	assert_eq!(state.get("partial"), Some(&Value::Bool(true)));
}

#[test]
fn globals_do_not_leak_between_evaluations() {
	let engine = engine();
	let source = "counter = (counter or 0) + 1 return counter";
	assert_eq!(eval_with(&engine, source, &mut EvaluationState::new()).expect("eval"), Value::Int(1));
	assert_eq!(eval_with(&engine, source, &mut EvaluationState::new()).expect("eval"), Value::Int(1));
}

#[test]
fn sandbox_hides_host_access() {
	assert_eq!(
		eval("return dofile == nil and loadfile == nil and os == nil and package.loadlib == nil").expect("eval"),
		Value::Bool(true)
	);
	assert!(eval("return require('os')").is_err());
	assert!(eval("return require('debug')").is_err());
	let binary = eval("local f, err = load(string.dump(function() return 1 end)) return f == nil and err ~= nil").expect("eval");
	assert_eq!(binary, Value::Bool(true));
	assert_eq!(eval("return load('return 40 + 2')()").expect("text chunks still load"), Value::Int(42));
}

#[test]
fn output_goes_to_sink_or_nowhere() {
	let engine = engine();
	let unit = engine.compile(b"local io = require('io') io.write('a', 1, ' ', 1.23) return nil", "write").expect("compile");

	let mut sink = Vec::new();
	let value = engine
		.eval(&unit, &mut EvaluationState::new(), Deadline::none(), Some(&mut sink))
		.expect("eval");
	assert_eq!(value, Value::Nothing);
	assert_eq!(sink, b"a1 1.23");

	engine
		.eval(&unit, &mut EvaluationState::new(), Deadline::none(), None)
		.expect("eval without sink should still succeed");
}

#[test]
fn store_update_commits_and_forwards_results() {
	let engine = engine();
	let source = r#"
		local m = require('@lmb')
		return m.store:update(function(tx)
			tx.counter = 1
			return 1949
		end)
	"#;
	assert_eq!(eval_with(&engine, source, &mut EvaluationState::new()).expect("eval"), Value::Int(1949));
	assert_eq!(engine.store().get("counter").expect("store read"), Some(Value::Int(1)));

	let empty = "return require('@lmb').store:update(function(tx) tx.other = 2 end)";
	assert_eq!(eval_with(&engine, empty, &mut EvaluationState::new()).expect("eval"), Value::Nothing);
	assert_eq!(engine.store().get("other").expect("store read"), Some(Value::Int(2)));
}

#[test]
fn capability_objects_expose_get_and_set() {
	let engine = engine();
	let mut state = EvaluationState::new();
	let source = r#"
		local m = require('@lmb')
		m.state:set('greeting', 'hi')
		m.store:set('get', 'shadowed key')
		return m.store:update(function(tx)
			tx:set('n', (tx:get('n') or 0) + 41)
			return m.state:get('greeting') .. ' ' .. m.store:get('get') .. ' ' .. tx.n
		end)
	"#;
	let value = eval_with(&engine, source, &mut state).expect("eval");
	assert_eq!(value, Value::from("hi shadowed key 41"));
	assert_eq!(state.get("greeting"), Some(&Value::from("hi")));
	assert_eq!(engine.store().get("n").expect("store read"), Some(Value::Int(41)));
}

#[test]
fn store_update_rolls_back_on_error() {
	let engine = engine();
	engine.store().put("alice", &Value::Int(50)).expect("seed");
	engine.store().put("bob", &Value::Int(50)).expect("seed");
	let source = r#"
		local m = require('@lmb')
		local ok = pcall(function()
			m.store:update(function(tx)
				tx.alice = tx.alice - 100
				tx.bob = tx.bob + 100
				if tx.alice < 0 then error('insufficient fund') end
			end)
		end)
		return { ok = ok, alice = m.store.alice, bob = m.store.bob }
	"#;

	let value = eval_with(&engine, source, &mut EvaluationState::new()).expect("eval");
	assert_eq!(value.get("ok"), Some(&Value::Bool(false)));
	assert_eq!(value.get("alice"), Some(&Value::Int(50)));
	assert_eq!(value.get("bob"), Some(&Value::Int(50)));
}

#[test]
fn unhandled_update_error_fails_evaluation() {
	let engine = engine();
	let source = "require('@lmb').store:update(function(tx) tx.x = 1 error('nope') end)";
	let err = eval_with(&engine, source, &mut EvaluationState::new()).expect_err("error should propagate");
	assert!(err.to_string().contains("nope"), "got: {err}");
	assert_eq!(engine.store().get("x").expect("store read"), None);
}

#[test]
fn concurrent_script_updates_do_not_lose_increments() {
	let dir = tempfile::tempdir().expect("temp dir");
	let store = Store::open(dir.path().join("db.sqlite3")).expect("store should open");
	let engine = Engine::new(Arc::new(store));
	let unit = engine
		.compile(
			b"local m = require('@lmb') m.store:update(function(s) s.counter = (s.counter or 0) + 1 end) return true",
			"counter",
		)
		.expect("compile");

	std::thread::scope(|scope| {
		for _ in 0..100 {
			scope.spawn(|| {
				let value = engine
					.eval(&unit, &mut EvaluationState::new(), Deadline::after(Duration::from_secs(30)), None)
					.expect("update should succeed");
				assert_eq!(value, Value::Bool(true));
			});
		}
	});

	assert_eq!(engine.store().get("counter").expect("store read"), Some(Value::Int(100)));
}

#[test]
fn store_errors_are_classified() {
	let engine = engine();
	let source = r#"
		local m = require('@lmb')
		m.store:update(function()
			m.store:update(function() end)
		end)
	"#;
	let err = eval_with(&engine, source, &mut EvaluationState::new()).expect_err("nested transaction should fail");
	assert_eq!(err.kind(), ErrorKind::Store, "got: {err}");
}

#[tokio::test]
async fn spawn_eval_captures_state_and_output() {
	let engine = Arc::new(engine());
	let unit = engine
		.compile(b"local m = require('@lmb') m.state.seen = true require('io').write('out') return 7", "spawned")
		.expect("compile");

	let outcome = Arc::clone(&engine)
		.spawn_eval(unit, EvaluationState::new(), Deadline::after(Duration::from_secs(5)))
		.await
		.expect("spawned eval should succeed");

	assert_eq!(outcome.value, Value::Int(7));
	assert_eq!(outcome.output, b"out");
	assert_eq!(outcome.state.get("seen"), Some(&Value::Bool(true)));
}

#[test]
fn unknown_module_is_rejected() {
	let err = eval("return require('definitely.missing')").expect_err("missing module");
	assert_eq!(err.kind(), ErrorKind::Runtime);
}

#[test]
fn deep_tables_fail_conversion() {
	let engine = engine().with_config(EngineConfig {
		max_depth: 2,
		..EngineConfig::default()
	});
	let err = eval_with(&engine, "return {{{}}}", &mut EvaluationState::new()).expect_err("too deep");
	assert!(err.to_string().contains("nesting"), "got: {err}");
}
