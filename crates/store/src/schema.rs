use std::time::Duration;

use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;

/// Ordered migrations; `PRAGMA user_version` records how many have run.
const MIGRATIONS: &[&str] = &["CREATE TABLE IF NOT EXISTS store (
	name TEXT PRIMARY KEY,
	value BLOB NOT NULL,
	type_hint TEXT NOT NULL DEFAULT '',
	size INTEGER NOT NULL DEFAULT 0
);"];

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) fn configure(conn: &Connection, on_disk: bool) -> Result<()> {
	conn.busy_timeout(BUSY_TIMEOUT)?;
	if on_disk {
		let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
		debug!(journal_mode = %mode, "store journal configured");
		conn.pragma_update(None, "synchronous", "NORMAL")?;
	}
	Ok(())
}

pub(crate) fn migrate(conn: &Connection) -> Result<()> {
	let applied: usize = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
	for (idx, sql) in MIGRATIONS.iter().enumerate().skip(applied) {
		conn.execute_batch(sql)?;
		conn.pragma_update(None, "user_version", idx + 1)?;
		debug!(version = idx + 1, "store schema migrated");
	}
	Ok(())
}
