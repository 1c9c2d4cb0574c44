use clap::CommandFactory;

use super::*;

#[test]
fn cli_definition_is_valid() {
	Cli::command().debug_assert();
}

#[test]
fn parse_simple_units() {
	assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
	assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
	assert_eq!(parse_duration("5m"), Ok(Duration::from_secs(300)));
	assert_eq!(parse_duration("2h"), Ok(Duration::from_secs(7200)));
}

#[test]
fn parse_compound_duration() {
	assert_eq!(parse_duration("1m30s"), Ok(Duration::from_secs(90)));
	assert_eq!(parse_duration("1h1m1s500ms"), Ok(Duration::from_millis(3_661_500)));
}

#[test]
fn bare_number_is_seconds() {
	assert_eq!(parse_duration("15"), Ok(Duration::from_secs(15)));
	assert_eq!(parse_duration(" 0 "), Ok(Duration::ZERO));
}

#[test]
fn reject_malformed_durations() {
	assert!(parse_duration("").is_err());
	assert!(parse_duration("s").is_err());
	assert!(parse_duration("10x").is_err());
	assert!(parse_duration("1m30").is_err());
	assert!(parse_duration("-5s").is_err());
}

#[test]
fn global_defaults() {
	let cli = Cli::try_parse_from(["lmb", "eval", "--file", "a.lua"]).expect("eval should parse");
	assert!(!cli.debug);
	assert_eq!(cli.store_path, PathBuf::from("db.sqlite3"));
	assert_eq!(cli.timeout, Duration::from_secs(30));
	assert_eq!(cli.http_timeout, Duration::from_secs(30));
	let Command::Eval { file } = cli.command else {
		panic!("expected eval, got {:?}", cli.command);
	};
	assert_eq!(file, PathBuf::from("a.lua"));
}

#[test]
fn global_flags_after_subcommand() {
	let cli = Cli::try_parse_from(["lmb", "check-syntax", "--file", "-", "--timeout", "1m30s", "--debug"]).expect("check-syntax should parse");
	assert!(cli.debug);
	assert_eq!(cli.timeout, Duration::from_secs(90));
	assert!(matches!(cli.command, Command::CheckSyntax { ref file } if file.as_os_str() == "-"));
}

#[test]
fn serve_bind_default_and_override() {
	let cli = Cli::try_parse_from(["lmb", "serve", "--file", "h.lua"]).expect("serve should parse");
	let Command::Serve { bind, .. } = cli.command else {
		panic!("expected serve");
	};
	assert_eq!(bind, "127.0.0.1:3000".parse::<SocketAddr>().expect("addr"));

	let cli = Cli::try_parse_from(["lmb", "--store-path", ":memory:", "serve", "--bind", "0.0.0.0:8080", "--file", "h.lua"])
		.expect("serve should parse");
	assert_eq!(cli.store_path, PathBuf::from(":memory:"));
	assert!(matches!(cli.command, Command::Serve { bind, .. } if bind.port() == 8080));
}

#[test]
fn file_is_required() {
	assert!(Cli::try_parse_from(["lmb", "eval"]).is_err());
	assert!(Cli::try_parse_from(["lmb", "serve"]).is_err());
}
