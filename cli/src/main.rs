//! Spawn CLI - launch AI coding agents on any cloud

use clap::Parser;
use tracing_subscriber::EnvFilter;

use spawn_cli::cli::Cli;
use spawn_cli::infra::terminal::reset_terminal;
use spawn_cli::output::OutputContext;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("SPAWN_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let no_color = cli.no_color;
    let result = cli.run().await;
    reset_terminal();
    if let Err(e) = result {
        OutputContext::new(no_color, false).report_failure(&e);
        std::process::exit(1);
    }
}
