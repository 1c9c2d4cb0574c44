use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "lmb")]
#[command(about = "Run sandboxed Lua scripts from the shell or over HTTP")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
	/// Force debug logging (overrides RUST_LOG and LOG_LEVEL)
	#[arg(long, global = true)]
	pub debug: bool,

	/// SQLite file backing the persistent store (`:memory:` for a throwaway one)
	#[arg(long, global = true, value_name = "PATH", default_value = "db.sqlite3")]
	pub store_path: PathBuf,

	/// Wall-clock limit per evaluation, e.g. `500ms`, `30s`, `1m30s`
	#[arg(long, global = true, value_name = "DURATION", default_value = "30s", value_parser = parse_duration)]
	pub timeout: Duration,

	/// Timeout applied to requests made through the `http` module
	#[arg(long, global = true, value_name = "DURATION", default_value = "30s", value_parser = parse_duration)]
	pub http_timeout: Duration,

	/// Subcommand to execute.
	#[command(subcommand)]
	pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
	/// Evaluate a script once and print its result
	Eval {
		/// Script path, or `-` to read it from stdin
		#[arg(long, value_name = "PATH")]
		file: PathBuf,
	},
	/// Compile a script without running it
	CheckSyntax {
		/// Script path, or `-` to read it from stdin
		#[arg(long, value_name = "PATH")]
		file: PathBuf,
	},
	/// Serve a script over HTTP, one evaluation per request
	Serve {
		/// Address to listen on
		#[arg(long, value_name = "ADDR", default_value = "127.0.0.1:3000")]
		bind: SocketAddr,

		/// Script path, or `-` to read it from stdin
		#[arg(long, value_name = "PATH")]
		file: PathBuf,
	},
}

/// Parses durations such as `250ms`, `30s`, `5m`, `1h` and compounds like
/// `1m30s`. A bare number is taken as seconds.
pub fn parse_duration(text: &str) -> Result<Duration, String> {
	let text = text.trim();
	if text.is_empty() {
		return Err("empty duration".to_owned());
	}
	if let Ok(secs) = text.parse::<u64>() {
		return Ok(Duration::from_secs(secs));
	}

	let mut total = Duration::ZERO;
	let mut rest = text;
	while !rest.is_empty() {
		let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
		if digits == 0 {
			return Err(format!("expected a number in `{text}`"));
		}
		let amount: u64 = rest[..digits].parse().map_err(|err| format!("invalid number in `{text}`: {err}"))?;
		rest = &rest[digits..];

		let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
		let part = match &rest[..unit_len] {
			"ms" => Duration::from_millis(amount),
			"s" => Duration::from_secs(amount),
			"m" => Duration::from_secs(amount.saturating_mul(60)),
			"h" => Duration::from_secs(amount.saturating_mul(3600)),
			"" => return Err(format!("missing unit after `{amount}` in `{text}`")),
			unit => return Err(format!("unknown unit `{unit}` in `{text}` (expected ms, s, m or h)")),
		};
		total = total.saturating_add(part);
		rest = &rest[unit_len..];
	}
	Ok(total)
}

#[cfg(test)]
mod tests;
