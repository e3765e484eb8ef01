//! auditscope CLI - Command-line access to the audit log viewport.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auditscope=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Query(args) => commands::query::run(&args).await,
        Commands::Export(args) => commands::export::run(&args).await,
        Commands::Tail(args) => commands::tail::run(&args).await,
        Commands::Version => {
            println!("auditscope {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
