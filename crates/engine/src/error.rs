use std::fmt;

use lmb_store::StoreError;
use thiserror::Error;

use crate::deadline::Abort;

/// Line/column of a syntax error, both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntaxPosition {
	pub line: usize,
	pub column: usize,
}

impl fmt::Display for SyntaxPosition {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "line:{}(column:{})", self.line, self.column)
	}
}

#[derive(Debug, Error)]
pub enum EvalError {
	#[error("{name}: {position}: {message}")]
	Syntax {
		name: String,
		position: SyntaxPosition,
		message: String,
	},

	#[error("compile error: {0}")]
	Compile(String),

	#[error("runtime error: {0}")]
	Runtime(String),

	#[error("store error: {0}")]
	Store(String),

	#[error("deadline exceeded")]
	DeadlineExceeded,

	#[error("evaluation cancelled")]
	Cancelled,

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("evaluation task failed: {0}")]
	Join(String),
}

/// Coarse classification of [`EvalError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	Syntax,
	Compile,
	Runtime,
	Store,
	DeadlineExceeded,
	Cancelled,
	Io,
}

impl EvalError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Syntax { .. } => ErrorKind::Syntax,
			Self::Compile(_) => ErrorKind::Compile,
			Self::Runtime(_) | Self::Join(_) => ErrorKind::Runtime,
			Self::Store(_) => ErrorKind::Store,
			Self::DeadlineExceeded => ErrorKind::DeadlineExceeded,
			Self::Cancelled => ErrorKind::Cancelled,
			Self::Io(_) => ErrorKind::Io,
		}
	}

	/// Classifies an error raised while running a chunk.
	pub(crate) fn from_lua(err: &mlua::Error) -> Self {
		match err {
			mlua::Error::CallbackError { cause, .. } | mlua::Error::WithContext { cause, .. } => Self::from_lua(cause),
			mlua::Error::ExternalError(inner) => match inner.downcast_ref::<StoreError>() {
				Some(store) => Self::Store(store.to_string()),
				None => Self::Runtime(inner.to_string()),
			},
			mlua::Error::RuntimeError(message) => Self::Runtime(message.clone()),
			other => Self::Runtime(other.to_string()),
		}
	}
}

impl From<Abort> for EvalError {
	fn from(abort: Abort) -> Self {
		match abort {
			Abort::Deadline => Self::DeadlineExceeded,
			Abort::Cancelled => Self::Cancelled,
		}
	}
}

pub type Result<T> = std::result::Result<T, EvalError>;
