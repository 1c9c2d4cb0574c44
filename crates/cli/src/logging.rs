use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "info";

/// Picks the filter directive: `--debug` wins, then `RUST_LOG`, then the
/// older `LOG_LEVEL` variable, then `info`.
pub fn directive(debug: bool, rust_log: Option<String>, log_level: Option<String>) -> String {
	if debug {
		return "debug".to_owned();
	}
	[rust_log, log_level]
		.into_iter()
		.flatten()
		.map(|value| value.trim().to_owned())
		.find(|value| !value.is_empty())
		.unwrap_or_else(|| DEFAULT_DIRECTIVE.to_owned())
}

/// Installs the stderr subscriber. Stdout is left for script results.
pub fn setup_tracing(debug: bool) {
	let directive = directive(debug, std::env::var("RUST_LOG").ok(), std::env::var("LOG_LEVEL").ok());
	let filter = EnvFilter::try_new(&directive).unwrap_or_else(|err| {
		eprintln!("ignoring invalid log filter `{directive}`: {err}");
		EnvFilter::new(DEFAULT_DIRECTIVE)
	});

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
