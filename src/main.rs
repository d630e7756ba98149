use clap::Parser;
use tracing_subscriber::EnvFilter;

use points_ledger::cli::{ledger, Cli};
use points_ledger::config::LedgerConfig;
use points_ledger::init;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = LedgerConfig::load_or_default(&cli.config);

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut services = init::bootstrap(&config)?;
    let result = ledger::handle_command(&mut services, cli.command);
    services.store.flush();
    result
}
