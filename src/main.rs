use anyhow::{anyhow, Context};
use clap::Parser;

use codex_ledger::cli::{execute, Cli};
use codex_ledger::config::AppConfig;
use codex_ledger::logging::{init_logging, LoggingConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging FIRST
    init_logging(LoggingConfig::from_env().verbose(cli.verbose))
        .map_err(|e| anyhow!(e))
        .context("failed to initialize logging")?;

    let mut config = AppConfig::from_env().map_err(|e| anyhow!(e))?;
    cli.apply(&mut config);
    config.validate().map_err(|e| anyhow!(e))?;
    tracing::debug!("Configuration: {:?}", config);

    let mut stdout = std::io::stdout().lock();
    execute(cli.command, &config, &mut stdout).await
}
