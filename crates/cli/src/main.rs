mod cli;
mod commands;
mod logging;

use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Command};
use lmb_engine::{Engine, EngineConfig, Input};
use lmb_store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	logging::setup_tracing(cli.debug);

	if let Command::CheckSyntax { file } = &cli.command {
		return commands::check_syntax(file);
	}

	let store = Store::open(&cli.store_path)?;
	let config = EngineConfig {
		http_timeout: cli.http_timeout,
		..EngineConfig::default()
	};
	let engine = Engine::new(Arc::new(store)).with_config(config);

	match cli.command {
		Command::Eval { file } => commands::eval(Arc::new(engine.with_input(Input::stdin())), &file, cli.timeout).await,
		Command::Serve { bind, file } => commands::serve(Arc::new(engine), bind, &file, cli.timeout).await,
		Command::CheckSyntax { .. } => Ok(()),
	}
}
