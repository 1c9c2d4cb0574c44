//! Durable key-value store shared by every evaluation in the process.
//!
//! Values are [`lmb_value::Value`]s serialized with MessagePack into a single
//! SQLite table. All access goes through one connection behind a reentrant
//! mutex: a [`Transaction`] holds the lock from `BEGIN IMMEDIATE` until commit
//! or rollback, so concurrent read-modify-write updates serialize and never
//! lose writes. Plain [`Store::get`]/[`Store::put`] calls made on the thread
//! that owns an open transaction join that transaction.

mod error;
mod schema;

use std::path::Path;
use std::time::Instant;

use lmb_value::Value;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{trace, warn};

pub use error::{Result, StoreError};

const IN_MEMORY: &str = ":memory:";

/// A stored entry with its diagnostic metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistentRecord {
	pub name: String,
	pub value: Value,
	/// [`lmb_value::ValueType`] name at write time.
	pub type_hint: String,
	/// Encoded payload length in bytes. Informational only.
	pub size: u64,
}

pub struct Store {
	conn: ReentrantMutex<Connection>,
}

impl std::fmt::Debug for Store {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Store").finish_non_exhaustive()
	}
}

impl Store {
	/// Opens (creating if needed) the store at `path`. `":memory:"` opens a
	/// private in-memory database.
	pub fn open(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		if path.as_os_str() == IN_MEMORY {
			return Self::open_in_memory();
		}
		let conn = Connection::open(path)?;
		Self::init(conn, true)
	}

	pub fn open_in_memory() -> Result<Self> {
		Self::init(Connection::open_in_memory()?, false)
	}

	fn init(conn: Connection, on_disk: bool) -> Result<Self> {
		schema::configure(&conn, on_disk)?;
		schema::migrate(&conn)?;
		Ok(Self {
			conn: ReentrantMutex::new(conn),
		})
	}

	pub fn get(&self, name: &str) -> Result<Option<Value>> {
		let conn = self.conn.lock();
		read_value(&conn, name)
	}

	/// Upserts `value` under `name`.
	pub fn put(&self, name: &str, value: &Value) -> Result<()> {
		let conn = self.conn.lock();
		write_value(&conn, name, value)
	}

	/// Reads an entry together with its metadata.
	pub fn record(&self, name: &str) -> Result<Option<PersistentRecord>> {
		let conn = self.conn.lock();
		let row = conn
			.prepare_cached("SELECT value, type_hint, size FROM store WHERE name = ?1")?
			.query_row(params![name], |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?)))
			.optional()?;
		let Some((bytes, type_hint, size)) = row else {
			return Ok(None);
		};
		Ok(Some(PersistentRecord {
			name: name.to_owned(),
			value: decode(name, &bytes)?,
			type_hint,
			size: u64::try_from(size).unwrap_or_default(),
		}))
	}

	/// Starts a write transaction, blocking until no other thread holds one.
	///
	/// Starting a second transaction on a thread that already owns one fails
	/// with [`StoreError::Sqlite`].
	pub fn begin(&self) -> Result<Transaction<'_>> {
		let conn = self.conn.lock();
		conn.execute_batch("BEGIN IMMEDIATE")?;
		trace!("store transaction started");
		Ok(Transaction {
			conn,
			started: Instant::now(),
			finished: false,
		})
	}

	/// Runs `f` inside a transaction: commits when it returns `Ok`, rolls
	/// back when it returns `Err`.
	pub fn update<T, E>(&self, f: impl FnOnce(&Transaction<'_>) -> std::result::Result<T, E>) -> std::result::Result<T, E>
	where
		E: From<StoreError>,
	{
		let tx = self.begin()?;
		match f(&tx) {
			Ok(out) => {
				tx.commit()?;
				Ok(out)
			}
			Err(err) => {
				tx.rollback()?;
				Err(err)
			}
		}
	}
}

/// Exclusive, atomic view over the store. Dropped without
/// [`commit`](Self::commit) it rolls back.
pub struct Transaction<'a> {
	conn: ReentrantMutexGuard<'a, Connection>,
	started: Instant,
	finished: bool,
}

impl Transaction<'_> {
	pub fn get(&self, name: &str) -> Result<Option<Value>> {
		read_value(&self.conn, name)
	}

	pub fn put(&self, name: &str, value: &Value) -> Result<()> {
		write_value(&self.conn, name, value)
	}

	pub fn commit(mut self) -> Result<()> {
		self.conn.execute_batch("COMMIT")?;
		self.finished = true;
		trace!(duration = ?self.started.elapsed(), "store transaction committed");
		Ok(())
	}

	pub fn rollback(mut self) -> Result<()> {
		self.finished = true;
		self.conn.execute_batch("ROLLBACK")?;
		trace!(duration = ?self.started.elapsed(), "store transaction rolled back");
		Ok(())
	}
}

impl Drop for Transaction<'_> {
	fn drop(&mut self) {
		if !self.finished
			&& let Err(err) = self.conn.execute_batch("ROLLBACK")
		{
			warn!(error = %err, "failed to roll back abandoned store transaction");
		}
	}
}

fn read_value(conn: &Connection, name: &str) -> Result<Option<Value>> {
	let bytes = conn
		.prepare_cached("SELECT value FROM store WHERE name = ?1")?
		.query_row(params![name], |row| row.get::<_, Vec<u8>>(0))
		.optional()?;
	bytes.map(|bytes| decode(name, &bytes)).transpose()
}

fn write_value(conn: &Connection, name: &str, value: &Value) -> Result<()> {
	let bytes = rmp_serde::to_vec(value).map_err(|source| StoreError::Encode { name: name.to_owned(), source })?;
	let size = i64::try_from(bytes.len()).unwrap_or(i64::MAX);
	conn.prepare_cached("INSERT OR REPLACE INTO store (name, value, type_hint, size) VALUES (?1, ?2, ?3, ?4)")?
		.execute(params![name, bytes, value.get_type().as_str(), size])?;
	Ok(())
}

fn decode(name: &str, bytes: &[u8]) -> Result<Value> {
	rmp_serde::from_slice(bytes).map_err(|source| StoreError::Decode { name: name.to_owned(), source })
}
