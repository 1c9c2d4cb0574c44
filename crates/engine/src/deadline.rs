use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// Wall-clock bound plus optional cancellation signal for one evaluation.
#[derive(Debug, Clone, Default)]
pub struct Deadline {
	at: Option<Instant>,
	token: Option<CancellationToken>,
}

/// Why a running evaluation was stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Abort {
	Deadline,
	Cancelled,
}

impl Abort {
	pub(crate) const fn message(self) -> &'static str {
		match self {
			Self::Deadline => "deadline exceeded",
			Self::Cancelled => "evaluation cancelled",
		}
	}
}

impl Deadline {
	/// Expires `timeout` from now. Durations too large to represent never expire.
	pub fn after(timeout: Duration) -> Self {
		Self {
			at: Instant::now().checked_add(timeout),
			token: None,
		}
	}

	/// Never expires; only cancellation stops the evaluation.
	pub fn none() -> Self {
		Self::default()
	}

	pub fn with_token(mut self, token: CancellationToken) -> Self {
		self.token = Some(token);
		self
	}

	pub(crate) fn check(&self) -> Result<(), Abort> {
		if self.token.as_ref().is_some_and(CancellationToken::is_cancelled) {
			return Err(Abort::Cancelled);
		}
		if self.at.is_some_and(|at| Instant::now() >= at) {
			return Err(Abort::Deadline);
		}
		Ok(())
	}
}
