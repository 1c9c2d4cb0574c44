use thiserror::Error;

/// Errors raised by [`Store`](crate::Store) and [`Transaction`](crate::Transaction).
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("store database error: {0}")]
	Sqlite(#[from] rusqlite::Error),

	#[error("failed to encode value for {name}: {source}")]
	Encode {
		name: String,
		source: rmp_serde::encode::Error,
	},

	#[error("failed to decode value for {name}: {source}")]
	Decode {
		name: String,
		source: rmp_serde::decode::Error,
	},
}

pub type Result<T> = std::result::Result<T, StoreError>;
