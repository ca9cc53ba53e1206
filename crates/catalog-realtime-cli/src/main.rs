use anyhow::Context;
use catalog_realtime_cli::{Cli, logging};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.json_logs).context("failed to initialize logging")?;

    if let Err(error) = catalog_realtime_cli::run(cli).await {
        for hint in error.suggestions() {
            eprintln!("hint: {hint}");
        }
        return Err(error.into());
    }
    Ok(())
}
