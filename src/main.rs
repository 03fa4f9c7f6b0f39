use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use companion_pool::cli::{self, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let result = match cli.command {
        Commands::Chat(args) => cli::chat::run_chat(args)
            .await
            .context("chat session failed"),
        Commands::CheckConfig(args) => cli::check::run_check_config(args)
            .await
            .context("configuration check failed"),
    };

    if let Err(e) = result {
        tracing::error!("command failed: {:?}", e);
        eprintln!("companion-pool: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
