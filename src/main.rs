use clap::Parser;
use tracing_subscriber::EnvFilter;

use expense_tracker_cli::cli::Cli;

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    expense_tracker_cli::cli::run(cli)
}

// Diagnostics only. Everything the user asked for goes to stdout; warnings the user should
// act on are printed by the commands themselves.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("EXPENSES_LOG").unwrap_or_else(|_| EnvFilter::new("error"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
