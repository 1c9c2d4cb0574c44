//! Subcommand bodies. Each returns `anyhow::Result` so `main` can report
//! failures uniformly and exit non-zero.

use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use lmb_engine::{Deadline, Engine, EvalOutcome, EvaluationState};
use lmb_serve::AppState;
use tokio::net::TcpListener;
use tracing::{debug, warn};

/// Reads the script at `path` (`-` for stdin) and returns it with the chunk
/// name used in error messages.
pub fn read_source(path: &Path) -> anyhow::Result<(Vec<u8>, String)> {
	if path.as_os_str() == "-" {
		let mut source = Vec::new();
		io::stdin().lock().read_to_end(&mut source).context("failed to read script from stdin")?;
		return Ok((source, "(stdin)".to_owned()));
	}
	let source = std::fs::read(path).with_context(|| format!("failed to read script {}", path.display()))?;
	Ok((source, path.display().to_string()))
}

pub async fn eval(engine: Arc<Engine>, path: &Path, timeout: Duration) -> anyhow::Result<()> {
	let (source, name) = read_source(path)?;
	let unit = engine.compile(&source, &name)?;
	let outcome = engine.spawn_eval(unit, EvaluationState::new(), Deadline::after(timeout)).await?;
	write_outcome(&outcome, &mut io::stdout().lock())?;
	Ok(())
}

/// Passes captured output through; without output the value is printed as
/// JSON on its own line.
pub fn write_outcome(outcome: &EvalOutcome, out: &mut impl Write) -> io::Result<()> {
	if outcome.output.is_empty() {
		serde_json::to_writer(&mut *out, &outcome.value.to_json())?;
		writeln!(out)?;
	} else {
		if !outcome.value.is_nothing() {
			warn!("script wrote output and returned a value; the value is not printed");
		}
		out.write_all(&outcome.output)?;
	}
	out.flush()
}

pub fn check_syntax(path: &Path) -> anyhow::Result<()> {
	let (source, name) = read_source(path)?;
	lmb_engine::compile(&source, &name)?;
	debug!(name, "syntax ok");
	Ok(())
}

pub async fn serve(engine: Arc<Engine>, bind: SocketAddr, path: &Path, timeout: Duration) -> anyhow::Result<()> {
	let (source, name) = read_source(path)?;
	let unit = engine.compile(&source, &name)?;
	let listener = TcpListener::bind(bind).await.with_context(|| format!("failed to bind {bind}"))?;
	lmb_serve::serve(listener, AppState::new(engine, unit, timeout)).await?;
	Ok(())
}
