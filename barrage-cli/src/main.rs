//! Barrage Binary Entry Point

use barrage_cli::{init_logging, run_attack, Cli, Command};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.logging.to_logging_config())?;

    match cli.command {
        Command::Attack(args) => {
            if let Err(e) = run_attack(args).await {
                tracing::error!("Attack failed: {:#}", e);
                return Err(e);
            }
        }
    }

    Ok(())
}
