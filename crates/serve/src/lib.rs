//! HTTP front-end: every request runs the configured script once.
//!
//! The request is exposed to the script as `state.request`; the script answers
//! through `state.status_code`, `state.headers`, `io.write` output and its
//! return value. Failures become an empty `500` with the detail logged only.

mod request;
mod response;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use lmb_engine::{CompiledUnit, Deadline, Engine};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum ServeError {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

/// Shared handler state: the engine, the script to run and its per-request
/// timeout.
#[derive(Clone)]
pub struct AppState {
	engine: Arc<Engine>,
	unit: Arc<CompiledUnit>,
	timeout: Duration,
}

impl AppState {
	pub fn new(engine: Arc<Engine>, unit: Arc<CompiledUnit>, timeout: Duration) -> Self {
		Self { engine, unit, timeout }
	}
}

impl fmt::Debug for AppState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AppState")
			.field("unit", &self.unit.name())
			.field("timeout", &self.timeout)
			.finish_non_exhaustive()
	}
}

/// Router that sends every method and path to the script.
pub fn router(state: AppState) -> Router {
	Router::new().fallback(handle).with_state(state)
}

pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), ServeError> {
	info!(addr = %listener.local_addr()?, script = state.unit.name(), "serving");
	axum::serve(listener, router(state)).await?;
	Ok(())
}

async fn handle(State(state): State<AppState>, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
	let started = Instant::now();
	let seeded = request::seed_state(&method, &uri, &headers, &body);

	// Dropping this handler (client went away) cancels the evaluation.
	let cancel = CancellationToken::new();
	let _cancel_on_drop = cancel.clone().drop_guard();
	let deadline = Deadline::after(state.timeout).with_token(cancel);

	let (response, size) = match Arc::clone(&state.engine).spawn_eval(Arc::clone(&state.unit), seeded, deadline).await {
		Ok(outcome) => response::project(outcome),
		Err(err) => {
			error!(%method, path = uri.path(), kind = ?err.kind(), error = %err, "evaluation failed");
			(StatusCode::INTERNAL_SERVER_ERROR.into_response(), 0)
		}
	};

	debug!(
		%method,
		path = uri.path(),
		query = uri.query().unwrap_or_default(),
		status = response.status().as_u16(),
		size,
		duration = ?started.elapsed(),
		headers = ?headers,
		"request completed"
	);
	response
}

#[cfg(test)]
mod tests;
