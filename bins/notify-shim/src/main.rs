mod cmd;
mod config;
mod error;
mod notification;

use clap::Parser;
use config::{Cli, Commands, Effective};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let eff = match Effective::new(&cli.common) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve(args) => cmd::serve::run(&eff, args).await,
        Commands::SendOne => cmd::send::run_one(&eff).await,
        Commands::SendBatch(args) => cmd::send::run_batch(&eff, args).await,
        Commands::Get(args) => cmd::get::run(&eff, args).await,
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
